use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// House
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    #[serde(default)]
    pub house_name: Option<String>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Rooms and devices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub room_name: String,
    #[serde(default)]
    pub house_name: Option<String>,
    pub floor: i32,
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub device_name: String,
    pub device_type_name: String,
    pub room_id: String,
    /// `true` while the device is active.
    pub device_status: bool,
}

impl Device {
    pub fn is_active(&self) -> bool {
        self.device_status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub device_name: String,
    pub device_type_name: String,
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub sensor_id: String,
    pub device_id: String,
    pub sensor_model_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSensor {
    pub sensor_model_name: String,
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Type-specific part of an actuator, keyed on its model code.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorSettings {
    BlindRoller,
    OnOffSwitch,
    Limiter { lower: i32, upper: i32 },
    DecimalLimiter { lower: f64, upper: f64, precision: f64 },
    /// A model code this client has no typed view for.
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ActuatorDto")]
pub struct Actuator {
    pub actuator_id: String,
    pub device_id: String,
    pub actuator_model_name: String,
    pub settings: ActuatorSettings,
}

impl Actuator {
    /// Whether the actuator is driven through a percentage position.
    pub fn is_blind_roller(&self) -> bool {
        self.settings == ActuatorSettings::BlindRoller
    }
}

/// Flat wire shape of an actuator; limit fields are null unless the model
/// uses them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActuatorDto {
    actuator_id: String,
    device_id: String,
    actuator_model_name: String,
    #[serde(default)]
    integer_lower_limit: Option<i32>,
    #[serde(default)]
    integer_upper_limit: Option<i32>,
    #[serde(default)]
    double_lower_limit: Option<f64>,
    #[serde(default)]
    double_upper_limit: Option<f64>,
    #[serde(default)]
    double_limit_precision: Option<f64>,
}

impl TryFrom<ActuatorDto> for Actuator {
    type Error = String;

    fn try_from(dto: ActuatorDto) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("{} is missing {field}", dto.actuator_model_name);

        let settings = match dto.actuator_model_name.as_str() {
            "ActuatorOfBlindRoller" => ActuatorSettings::BlindRoller,
            "ActuatorOfOnOffSwitch" => ActuatorSettings::OnOffSwitch,
            "ActuatorOfLimiter" => ActuatorSettings::Limiter {
                lower: dto.integer_lower_limit.ok_or_else(|| missing("integerLowerLimit"))?,
                upper: dto.integer_upper_limit.ok_or_else(|| missing("integerUpperLimit"))?,
            },
            "ActuatorOfDecimalLimiter" => ActuatorSettings::DecimalLimiter {
                lower: dto.double_lower_limit.ok_or_else(|| missing("doubleLowerLimit"))?,
                upper: dto.double_upper_limit.ok_or_else(|| missing("doubleUpperLimit"))?,
                precision: dto
                    .double_limit_precision
                    .ok_or_else(|| missing("doubleLimitPrecision"))?,
            },
            _ => ActuatorSettings::Other,
        };

        Ok(Actuator {
            actuator_id: dto.actuator_id,
            device_id: dto.device_id,
            actuator_model_name: dto.actuator_model_name,
            settings,
        })
    }
}

/// Body of `POST /actuators/device/{deviceId}`. Limit fields are sent only
/// for the actuator types that use them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActuator {
    pub actuator_model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integer_lower_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integer_upper_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_lower_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_upper_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_limit_precision: Option<f64>,
}

impl NewActuator {
    pub fn plain(model: impl Into<String>) -> Self {
        Self {
            actuator_model_name: model.into(),
            integer_lower_limit: None,
            integer_upper_limit: None,
            double_lower_limit: None,
            double_upper_limit: None,
            double_limit_precision: None,
        }
    }
}

/// Payload of `GET /actuators/{id}/current-percentage-value`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentValue {
    pub value: Measurement,
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// A reading value. The backend sends readings as strings, but numbers are
/// accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Measurement {
    Number(f64),
    Text(String),
}

impl Measurement {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Measurement::Number(n) => Some(*n),
            Measurement::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Number(n) => write!(f, "{n}"),
            Measurement::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub reading_id: String,
    pub sensor_id: String,
    pub reading_value: Measurement,
    pub timestamp: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorTypeEntry {
    pub sensor_type_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorModelEntry {
    pub sensor_model_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorTypeEntry {
    pub actuator_type_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorModelEntry {
    pub actuator_model_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTypeEntry {
    pub device_type_name: String,
}
