use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Group number the weather service answers with when it rejects a
/// configuration.
pub const REJECTED_GROUP: i32 = i32::MIN;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfiguration {
    pub group_number: i32,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationReply {
    pub group_number: i32,
}

/// Answer of the measurement endpoints. `measurement` may be a number, a
/// numeric string or `"NaN"`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementReply {
    pub measurement: Value,
    #[serde(default)]
    pub info: Option<String>,
}

impl MeasurementReply {
    /// The measurement as it was written on the wire.
    pub fn raw(&self) -> Option<String> {
        match &self.measurement {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.trim().to_owned()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.raw()?.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl SunEvent {
    pub fn option(self) -> &'static str {
        match self {
            SunEvent::Sunrise => "sunrise",
            SunEvent::Sunset => "sunset",
        }
    }
}

/// What the weather cards show. `None` means not loaded (yet).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherSnapshot {
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub temperature: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn measurement_parsing() {
        let reply: MeasurementReply = serde_json::from_value(json!({"measurement": 18.25})).unwrap();
        assert_eq!(reply.as_f64(), Some(18.25));

        let reply: MeasurementReply =
            serde_json::from_value(json!({"measurement": "NaN", "info": "hour out of range"})).unwrap();
        assert_eq!(reply.as_f64(), None);
        assert_eq!(reply.info.as_deref(), Some("hour out of range"));

        let reply: MeasurementReply = serde_json::from_value(json!({"measurement": "6.5"})).unwrap();
        assert_eq!(reply.raw().as_deref(), Some("6.5"));
    }
}
