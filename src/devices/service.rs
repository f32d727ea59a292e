use std::{borrow::Cow, collections::BTreeMap};

use tracing::{info, warn};

use crate::{
    backend::{
        models::{Actuator, Device, NewActuator, NewDevice, NewSensor, Sensor},
        HomeBackend,
    },
    error::{FormError, RemoteError},
    vocabulary::{
        actuator_model_label, actuator_type_label, device_type_label, sensor_model_label,
        sensor_type_label,
    },
};

pub const INVALID_DEVICE_NAME: &str = "Please enter a valid device name.";
pub const SELECT_DEVICE_TYPE: &str = "Please select a device type.";
pub const SELECT_SENSOR_TYPE: &str = "Please select a sensor type.";
pub const SELECT_SENSOR_MODEL: &str = "Please select a sensor model.";
pub const SELECT_ACTUATOR_TYPE: &str = "Please select an actuator type.";
pub const SELECT_ACTUATOR_MODEL: &str = "Please select an actuator model.";
pub const FILL_ALL_FIELDS: &str = "Please fill in all fields.";
pub const INVALID_INPUT: &str = "Invalid input. Please check the values.";

// ---------------------------------------------------------------------------
// Field errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    DeviceName,
    DeviceType,
    SensorType,
    SensorModel,
    ActuatorType,
    ActuatorModel,
    /// The type-specific limit inputs of an actuator, as a group.
    Limits,
}

/// Inline validation messages, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, Cow<'static, str>>);

impl FieldErrors {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(|message| message.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, message.as_ref()))
    }

    fn set(&mut self, field: Field, message: impl Into<Cow<'static, str>>) {
        self.0.insert(field, message.into());
    }

    fn clear(&mut self, field: Field) {
        self.0.remove(&field);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    /// The backend created the entity.
    Created(T),
    /// Validation failed, locally or at the backend; see the form's errors.
    Invalid,
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AddDeviceForm {
    name: String,
    device_type: String,
    errors: FieldErrors,
}

impl AddDeviceForm {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.errors.clear(Field::DeviceName);
    }

    pub fn set_device_type(&mut self, device_type: impl Into<String>) {
        self.device_type = device_type.into();
        self.errors.clear(Field::DeviceType);
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Check every field, recording a message for each invalid one.
    pub fn validate(&mut self) -> Option<NewDevice> {
        self.errors = FieldErrors::default();
        let name = self.name.trim();
        if name.is_empty() {
            self.errors.set(Field::DeviceName, INVALID_DEVICE_NAME);
        }
        if self.device_type.is_empty() {
            self.errors.set(Field::DeviceType, SELECT_DEVICE_TYPE);
        }

        self.errors.is_empty().then(|| NewDevice {
            device_name: name.to_owned(),
            device_type_name: self.device_type.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddSensorForm {
    sensor_type: String,
    sensor_model: String,
    errors: FieldErrors,
}

impl AddSensorForm {
    /// Selecting a type discards the model, whose choices depend on it.
    pub fn set_sensor_type(&mut self, sensor_type: impl Into<String>) {
        self.sensor_type = sensor_type.into();
        self.sensor_model.clear();
        self.errors.clear(Field::SensorType);
        self.errors.clear(Field::SensorModel);
    }

    pub fn set_sensor_model(&mut self, sensor_model: impl Into<String>) {
        self.sensor_model = sensor_model.into();
        self.errors.clear(Field::SensorModel);
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn validate(&mut self) -> Option<NewSensor> {
        self.errors = FieldErrors::default();
        if self.sensor_type.is_empty() {
            self.errors.set(Field::SensorType, SELECT_SENSOR_TYPE);
        } else if self.sensor_model.is_empty() {
            self.errors.set(Field::SensorModel, SELECT_SENSOR_MODEL);
        }

        self.errors.is_empty().then(|| NewSensor {
            sensor_model_name: self.sensor_model.clone(),
        })
    }
}

/// Raw text of the limit inputs. Which ones matter depends on the type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitInputs {
    pub integer_lower: String,
    pub integer_upper: String,
    pub double_lower: String,
    pub double_upper: String,
    pub double_precision: String,
}

#[derive(Debug, Clone, Default)]
pub struct AddActuatorForm {
    actuator_type: String,
    actuator_model: String,
    limits: LimitInputs,
    errors: FieldErrors,
}

impl AddActuatorForm {
    pub fn set_actuator_type(&mut self, actuator_type: impl Into<String>) {
        self.actuator_type = actuator_type.into();
        self.actuator_model.clear();
        self.errors = FieldErrors::default();
    }

    pub fn set_actuator_model(&mut self, actuator_model: impl Into<String>) {
        self.actuator_model = actuator_model.into();
        self.errors.clear(Field::ActuatorModel);
        self.errors.clear(Field::Limits);
    }

    pub fn set_limits(&mut self, limits: LimitInputs) {
        self.limits = limits;
        self.errors.clear(Field::Limits);
    }

    pub fn actuator_type(&self) -> &str {
        &self.actuator_type
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn validate(&mut self) -> Option<NewActuator> {
        self.errors = FieldErrors::default();
        if self.actuator_type.is_empty() {
            self.errors.set(Field::ActuatorType, SELECT_ACTUATOR_TYPE);
        } else if self.actuator_model.is_empty() {
            self.errors.set(Field::ActuatorModel, SELECT_ACTUATOR_MODEL);
        }

        let l = &self.limits;
        let required: Vec<&String> = match self.actuator_type.as_str() {
            "Limiter" => vec![&l.integer_lower, &l.integer_upper],
            "DecimalLimiter" => vec![&l.double_lower, &l.double_upper, &l.double_precision],
            _ => Vec::new(),
        };
        if required.iter().any(|v| v.trim().is_empty()) {
            self.errors.set(Field::Limits, FILL_ALL_FIELDS);
        }

        if !self.errors.is_empty() {
            return None;
        }

        match self.payload() {
            Some(payload) => Some(payload),
            None => {
                self.errors.set(Field::Limits, INVALID_INPUT);
                None
            }
        }
    }

    /// Request body with the limits the type uses, or `None` when one of them
    /// does not parse.
    fn payload(&self) -> Option<NewActuator> {
        let l = &self.limits;
        let mut payload = NewActuator::plain(self.actuator_model.clone());
        match self.actuator_type.as_str() {
            "Limiter" => {
                payload.integer_lower_limit = Some(l.integer_lower.trim().parse().ok()?);
                payload.integer_upper_limit = Some(l.integer_upper.trim().parse().ok()?);
            }
            "DecimalLimiter" => {
                payload.double_lower_limit = Some(l.double_lower.trim().parse().ok()?);
                payload.double_upper_limit = Some(l.double_upper.trim().parse().ok()?);
                payload.double_limit_precision = Some(l.double_precision.trim().parse().ok()?);
            }
            _ => {}
        }
        Some(payload)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// A selectable category code with its display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub code: String,
    pub label: &'static str,
}

fn choices(codes: Vec<String>, label: fn(&str) -> &'static str) -> Vec<Choice> {
    codes
        .into_iter()
        .map(|code| Choice {
            label: label(&code),
            code,
        })
        .collect()
}

/// Backend reason for a rejected submission, or `fallback` when it gave none.
fn rejection(reason: Option<String>, fallback: &'static str) -> Cow<'static, str> {
    reason.map_or(Cow::Borrowed(fallback), Cow::Owned)
}

/// Creates devices, sensors and actuators and loads the form choices.
#[derive(Debug, Clone)]
pub struct DeviceService {
    backend: HomeBackend,
}

impl DeviceService {
    pub fn new(backend: HomeBackend) -> Self {
        Self { backend }
    }

    pub async fn add_device(
        &self,
        room_id: &str,
        form: &mut AddDeviceForm,
    ) -> Result<Submission<Device>, FormError> {
        let Some(payload) = form.validate() else {
            return Ok(Submission::Invalid);
        };

        match self.backend.add_device(room_id, &payload).await {
            Ok(device) => {
                *form = AddDeviceForm::default();
                Ok(Submission::Created(device))
            }
            Err(RemoteError::Status { status: 422, reason }) => {
                form.errors.set(Field::DeviceName, rejection(reason, INVALID_DEVICE_NAME));
                Ok(Submission::Invalid)
            }
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Failed to add device");
                Err(FormError::Submit(e))
            }
        }
    }

    pub async fn add_sensor(
        &self,
        device_id: &str,
        form: &mut AddSensorForm,
    ) -> Result<Submission<Sensor>, FormError> {
        let Some(payload) = form.validate() else {
            return Ok(Submission::Invalid);
        };

        match self.backend.add_sensor(device_id, &payload).await {
            Ok(sensor) => {
                *form = AddSensorForm::default();
                Ok(Submission::Created(sensor))
            }
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Failed to add sensor");
                Err(FormError::Submit(e))
            }
        }
    }

    pub async fn add_actuator(
        &self,
        device_id: &str,
        form: &mut AddActuatorForm,
    ) -> Result<Submission<Actuator>, FormError> {
        let Some(payload) = form.validate() else {
            return Ok(Submission::Invalid);
        };

        match self.backend.add_actuator(device_id, &payload).await {
            Ok(actuator) => {
                *form = AddActuatorForm::default();
                Ok(Submission::Created(actuator))
            }
            Err(RemoteError::Status { status: 400 | 422, reason }) => {
                form.errors.set(Field::Limits, rejection(reason, INVALID_INPUT));
                Ok(Submission::Invalid)
            }
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Failed to add actuator");
                Err(FormError::Submit(e))
            }
        }
    }

    pub async fn device_types(&self) -> Result<Vec<Choice>, FormError> {
        let codes = self.backend.device_types().await.map_err(|source| FormError::Choices {
            what: "device types",
            source,
        })?;
        Ok(choices(codes, device_type_label))
    }

    pub async fn sensor_types(&self) -> Result<Vec<Choice>, FormError> {
        let codes = self.backend.sensor_types().await.map_err(|source| FormError::Choices {
            what: "sensor types",
            source,
        })?;
        Ok(choices(codes, sensor_type_label))
    }

    pub async fn sensor_models(&self, sensor_type: &str) -> Result<Vec<Choice>, FormError> {
        let codes = self
            .backend
            .sensor_models(sensor_type)
            .await
            .map_err(|source| FormError::Choices {
                what: "sensor models",
                source,
            })?;
        info!(sensor_type = %sensor_type, count = codes.len(), "Sensor models loaded");
        Ok(choices(codes, sensor_model_label))
    }

    pub async fn actuator_types(&self) -> Result<Vec<Choice>, FormError> {
        let codes = self.backend.actuator_types().await.map_err(|source| FormError::Choices {
            what: "actuator types",
            source,
        })?;
        Ok(choices(codes, actuator_type_label))
    }

    pub async fn actuator_models(&self, actuator_type: &str) -> Result<Vec<Choice>, FormError> {
        let codes = self
            .backend
            .actuator_models(actuator_type)
            .await
            .map_err(|source| FormError::Choices {
                what: "actuator models",
                source,
            })?;
        info!(actuator_type = %actuator_type, count = codes.len(), "Actuator models loaded");
        Ok(choices(codes, actuator_model_label))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        backend::models::ActuatorSettings,
        remote::{memory::MemoryTransport, ApiRequest, RemoteClient},
    };

    fn setup() -> (Arc<MemoryTransport>, DeviceService) {
        let transport = Arc::new(MemoryTransport::new());
        let backend = HomeBackend::new(RemoteClient::new("backend", transport.clone()), "TheHouse");
        (transport, DeviceService::new(backend))
    }

    #[tokio::test]
    async fn empty_device_name_is_caught_locally() {
        let (transport, service) = setup();
        let mut form = AddDeviceForm::default();
        form.set_name("   ");
        form.set_device_type("GridPowerMeter");

        let result = service.add_device("r1", &mut form).await.unwrap();

        assert_eq!(result, Submission::Invalid);
        assert_eq!(form.errors().get(Field::DeviceName), Some(INVALID_DEVICE_NAME));
        assert_eq!(form.errors().get(Field::DeviceType), None);
        assert_eq!(transport.total(), 0);

        form.set_name("Lamp");
        assert!(form.errors().is_empty());
    }

    #[tokio::test]
    async fn backend_name_rejection_lands_on_the_name_field() {
        let (transport, service) = setup();
        transport.respond(ApiRequest::post("/devices/room/r1", Value::Null), 422, "");
        let mut form = AddDeviceForm::default();
        form.set_name("???");
        form.set_device_type("GridPowerMeter");

        let result = service.add_device("r1", &mut form).await.unwrap();

        assert_eq!(result, Submission::Invalid);
        assert_eq!(form.errors().get(Field::DeviceName), Some(INVALID_DEVICE_NAME));

        let (transport, service) = setup();
        transport.respond_json(
            ApiRequest::post("/devices/room/r1", Value::Null),
            422,
            json!({"message": "Device name already in use"}),
        );
        service.add_device("r1", &mut form).await.unwrap();
        assert_eq!(form.errors().get(Field::DeviceName), Some("Device name already in use"));
    }

    #[tokio::test]
    async fn created_device_resets_the_form() {
        let (transport, service) = setup();
        transport.respond_json(
            ApiRequest::post("/devices/room/r1", Value::Null),
            200,
            json!({
                "deviceId": "d2",
                "deviceName": "Meter",
                "deviceTypeName": "GridPowerMeter",
                "roomId": "r1",
                "deviceStatus": true
            }),
        );
        let mut form = AddDeviceForm::default();
        form.set_name(" Meter ");
        form.set_device_type("GridPowerMeter");

        let Submission::Created(device) = service.add_device("r1", &mut form).await.unwrap() else {
            panic!("expected a created device");
        };
        assert_eq!(device.device_id, "d2");
        assert_eq!(transport.requests()[0].body.as_ref().unwrap()["deviceName"], "Meter");
        assert_eq!(form.validate(), None);
    }

    #[test]
    fn sensor_model_is_checked_only_with_a_type() {
        let mut form = AddSensorForm::default();
        assert_eq!(form.validate(), None);
        assert_eq!(form.errors().get(Field::SensorType), Some(SELECT_SENSOR_TYPE));
        assert_eq!(form.errors().get(Field::SensorModel), None);

        form.set_sensor_type("TemperatureCelsius");
        assert_eq!(form.validate(), None);
        assert_eq!(form.errors().get(Field::SensorModel), Some(SELECT_SENSOR_MODEL));

        form.set_sensor_model("SensorOfTemperature");
        assert_eq!(
            form.validate(),
            Some(NewSensor { sensor_model_name: "SensorOfTemperature".to_owned() })
        );
    }

    #[test]
    fn limiter_requires_integer_limits() {
        let mut form = AddActuatorForm::default();
        form.set_actuator_type("Limiter");
        form.set_actuator_model("ActuatorOfLimiter");
        form.set_limits(LimitInputs {
            integer_lower: "0".to_owned(),
            ..LimitInputs::default()
        });
        assert_eq!(form.validate(), None);
        assert_eq!(form.errors().get(Field::Limits), Some(FILL_ALL_FIELDS));

        form.set_limits(LimitInputs {
            integer_lower: "0".to_owned(),
            integer_upper: "ten".to_owned(),
            ..LimitInputs::default()
        });
        assert_eq!(form.validate(), None);
        assert_eq!(form.errors().get(Field::Limits), Some(INVALID_INPUT));

        form.set_limits(LimitInputs {
            integer_lower: "0".to_owned(),
            integer_upper: "10".to_owned(),
            ..LimitInputs::default()
        });
        let payload = form.validate().unwrap();
        assert_eq!(payload.integer_lower_limit, Some(0));
        assert_eq!(payload.integer_upper_limit, Some(10));
        assert_eq!(payload.double_lower_limit, None);
    }

    #[test]
    fn decimal_limiter_requires_all_three_values() {
        let mut form = AddActuatorForm::default();
        form.set_actuator_type("DecimalLimiter");
        form.set_actuator_model("ActuatorOfDecimalLimiter");
        form.set_limits(LimitInputs {
            double_lower: "0.5".to_owned(),
            double_upper: "9.5".to_owned(),
            ..LimitInputs::default()
        });
        assert_eq!(form.validate(), None);
        assert_eq!(form.errors().get(Field::Limits), Some(FILL_ALL_FIELDS));
    }

    #[tokio::test]
    async fn backend_rejected_limits_are_invalid_input() {
        let (transport, service) = setup();
        transport.respond(ApiRequest::post("/actuators/device/d1", Value::Null), 400, "");
        let mut form = AddActuatorForm::default();
        form.set_actuator_type("Limiter");
        form.set_actuator_model("ActuatorOfLimiter");
        form.set_limits(LimitInputs {
            integer_lower: "10".to_owned(),
            integer_upper: "0".to_owned(),
            ..LimitInputs::default()
        });

        let result = service.add_actuator("d1", &mut form).await.unwrap();
        assert_eq!(result, Submission::Invalid);
        assert_eq!(form.errors().get(Field::Limits), Some(INVALID_INPUT));
    }

    #[tokio::test]
    async fn backend_reason_replaces_the_default_message() {
        let (transport, service) = setup();
        transport.respond_json(
            ApiRequest::post("/actuators/device/d1", Value::Null),
            422,
            json!({"message": "Upper limit must be greater than lower limit"}),
        );
        let mut form = AddActuatorForm::default();
        form.set_actuator_type("Limiter");
        form.set_actuator_model("ActuatorOfLimiter");
        form.set_limits(LimitInputs {
            integer_lower: "10".to_owned(),
            integer_upper: "0".to_owned(),
            ..LimitInputs::default()
        });

        let result = service.add_actuator("d1", &mut form).await.unwrap();
        assert_eq!(result, Submission::Invalid);
        assert_eq!(
            form.errors().get(Field::Limits),
            Some("Upper limit must be greater than lower limit")
        );
    }

    #[tokio::test]
    async fn created_actuator_is_typed() {
        let (transport, service) = setup();
        transport.respond_json(
            ApiRequest::post("/actuators/device/d1", Value::Null),
            200,
            json!({"actuatorId": "a7", "deviceId": "d1", "actuatorModelName": "ActuatorOfBlindRoller"}),
        );
        let mut form = AddActuatorForm::default();
        form.set_actuator_type("BlindsRoller");
        form.set_actuator_model("ActuatorOfBlindRoller");

        let Submission::Created(actuator) = service.add_actuator("d1", &mut form).await.unwrap() else {
            panic!("expected a created actuator");
        };
        assert_eq!(actuator.settings, ActuatorSettings::BlindRoller);
        assert_eq!(
            transport.requests()[0].body,
            Some(json!({"actuatorModelName": "ActuatorOfBlindRoller"}))
        );
    }

    #[tokio::test]
    async fn choices_carry_labels() {
        let (transport, service) = setup();
        transport.respond_json(
            ApiRequest::get("/devicetypes"),
            200,
            json!([{"deviceTypeName": "GridPowerMeter"}, {"deviceTypeName": "Thermostat"}]),
        );

        let types = service.device_types().await.unwrap();
        assert_eq!(
            types,
            [
                Choice { code: "GridPowerMeter".to_owned(), label: "Grid Power Meter" },
                Choice { code: "Thermostat".to_owned(), label: "Unknown Device Type" },
            ]
        );

        let err = service.sensor_types().await.unwrap_err();
        assert!(matches!(err, FormError::Choices { what: "sensor types", .. }));
    }
}
