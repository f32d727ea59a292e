pub mod models;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::{
    aggregate::{fetch_detailed, Collection, ListShape},
    error::{AggregateError, RemoteError},
    remote::{ApiRequest, RemoteClient},
};

use self::models::{
    Actuator, ActuatorModelEntry, ActuatorTypeEntry, CurrentValue, Device, DeviceTypeEntry, House,
    NewActuator, NewDevice, NewSensor, Reading, Room, Sensor, SensorModelEntry, SensorTypeEntry,
};

/// Typed view of the home-automation backend contract.
#[derive(Debug, Clone)]
pub struct HomeBackend {
    remote: RemoteClient,
    house_id: String,
}

impl HomeBackend {
    pub fn new(remote: RemoteClient, house_id: impl Into<String>) -> Self {
        Self {
            remote,
            house_id: house_id.into(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: String) -> Result<T, RemoteError> {
        self.remote.fetch_as(&ApiRequest::get(path)).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: String,
        body: &B,
    ) -> Result<T, RemoteError> {
        let body = serde_json::to_value(body)
            .map_err(|e| RemoteError::Format(format!("failed to encode request body: {e}")))?;
        self.remote.fetch_as(&ApiRequest::post(path, body)).await
    }

    // -----------------------------------------------------------------------
    // House and rooms
    // -----------------------------------------------------------------------

    pub async fn house(&self) -> Result<House, RemoteError> {
        self.get(format!("/houses/{}", self.house_id)).await
    }

    pub async fn rooms(&self) -> Result<Vec<Room>, AggregateError> {
        fetch_detailed(&self.remote, &Collection::rooms()).await
    }

    pub async fn room(&self, room_id: &str) -> Result<Room, RemoteError> {
        self.get(format!("/rooms/{room_id}")).await
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    pub async fn devices_of_room(&self, room_id: &str) -> Result<Vec<Device>, AggregateError> {
        fetch_detailed(&self.remote, &Collection::devices_of_room(room_id)).await
    }

    pub async fn device(&self, device_id: &str) -> Result<Device, RemoteError> {
        self.get(format!("/devices/{device_id}")).await
    }

    pub async fn add_device(&self, room_id: &str, device: &NewDevice) -> Result<Device, RemoteError> {
        let created: Device = self.post(format!("/devices/room/{room_id}"), device).await?;
        info!(room_id = %room_id, device_id = %created.device_id, "Device added");
        Ok(created)
    }

    pub async fn deactivate_device(&self, device_id: &str) -> Result<(), RemoteError> {
        self.remote
            .call(&ApiRequest::put(format!("/devices/{device_id}/deactivate")))
            .await?;
        info!(device_id = %device_id, "Device deactivated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sensors
    // -----------------------------------------------------------------------

    pub async fn sensors_of_device(&self, device_id: &str) -> Result<Vec<Sensor>, AggregateError> {
        fetch_detailed(&self.remote, &Collection::sensors_of_device(device_id)).await
    }

    pub async fn sensor(&self, sensor_id: &str) -> Result<Sensor, RemoteError> {
        self.get(format!("/sensors/{sensor_id}")).await
    }

    pub async fn add_sensor(&self, device_id: &str, sensor: &NewSensor) -> Result<Sensor, RemoteError> {
        let created: Sensor = self.post(format!("/sensors/device/{device_id}"), sensor).await?;
        info!(device_id = %device_id, sensor_id = %created.sensor_id, "Sensor added");
        Ok(created)
    }

    // -----------------------------------------------------------------------
    // Actuators
    // -----------------------------------------------------------------------

    pub async fn actuators_of_device(&self, device_id: &str) -> Result<Vec<Actuator>, AggregateError> {
        fetch_detailed(&self.remote, &Collection::actuators_of_device(device_id)).await
    }

    pub async fn add_actuator(
        &self,
        device_id: &str,
        actuator: &NewActuator,
    ) -> Result<Actuator, RemoteError> {
        let created: Actuator = self.post(format!("/actuators/device/{device_id}"), actuator).await?;
        info!(device_id = %device_id, actuator_id = %created.actuator_id, "Actuator added");
        Ok(created)
    }

    /// Position the backend last confirmed for a blind roller, in percent.
    pub async fn current_percentage_value(&self, actuator_id: &str) -> Result<i32, RemoteError> {
        let current: CurrentValue = self
            .get(format!("/actuators/{actuator_id}/current-percentage-value"))
            .await?;
        current
            .value
            .as_f64()
            .filter(|v| v.is_finite())
            .map(|v| v.round() as i32)
            .ok_or_else(|| RemoteError::Format(format!("non-numeric position {}", current.value)))
    }

    pub async fn operate_blind_roller(&self, actuator_id: &str, percentage: i32) -> Result<(), RemoteError> {
        let request = ApiRequest::put(format!("/actuators/{actuator_id}/operate-blind-roller"))
            .with_query("percentage", percentage);
        self.remote.call(&request).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Readings
    // -----------------------------------------------------------------------

    pub async fn readings_of_device(
        &self,
        device_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Reading>, AggregateError> {
        fetch_detailed(
            &self.remote,
            &Collection::readings_of_device(device_id, start, end),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    async fn list<T: DeserializeOwned>(&self, path: String, shape: ListShape) -> Result<Vec<T>, RemoteError> {
        let payload: Value = self.get(path).await?;
        shape
            .members(payload)?
            .into_iter()
            .map(|member| serde_json::from_value(member).map_err(|e| RemoteError::Format(e.to_string())))
            .collect()
    }

    pub async fn sensor_types(&self) -> Result<Vec<String>, RemoteError> {
        let entries: Vec<SensorTypeEntry> = self
            .list("/sensortypes".to_owned(), ListShape::Embedded("sensorTypeIdDTOList"))
            .await?;
        Ok(entries.into_iter().map(|e| e.sensor_type_id).collect())
    }

    pub async fn sensor_models(&self, sensor_type: &str) -> Result<Vec<String>, RemoteError> {
        let entries: Vec<SensorModelEntry> = self
            .list(
                format!("/sensormodels/type/{sensor_type}"),
                ListShape::Embedded("sensorModelNameDTOList"),
            )
            .await?;
        Ok(entries.into_iter().map(|e| e.sensor_model_name).collect())
    }

    pub async fn actuator_types(&self) -> Result<Vec<String>, RemoteError> {
        let entries: Vec<ActuatorTypeEntry> = self.list("/actuatortypes".to_owned(), ListShape::Array).await?;
        Ok(entries.into_iter().map(|e| e.actuator_type_name).collect())
    }

    pub async fn actuator_models(&self, actuator_type: &str) -> Result<Vec<String>, RemoteError> {
        let entries: Vec<ActuatorModelEntry> = self
            .list(
                format!("/actuatormodels/type/{actuator_type}"),
                ListShape::Embedded("actuatorModelNameDTOList"),
            )
            .await?;
        Ok(entries.into_iter().map(|e| e.actuator_model_name).collect())
    }

    pub async fn device_types(&self) -> Result<Vec<String>, RemoteError> {
        let entries: Vec<DeviceTypeEntry> = self.list("/devicetypes".to_owned(), ListShape::Array).await?;
        Ok(entries.into_iter().map(|e| e.device_type_name).collect())
    }
}
