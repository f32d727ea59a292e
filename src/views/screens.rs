use std::fmt;

use crate::{
    backend::{
        models::{Actuator, ActuatorSettings, Device, House, Room, Sensor},
        HomeBackend,
    },
    control::{ActuatorControls, ControlPhase, ControlView, DispatchOutcome},
    devices::{AddActuatorForm, AddDeviceForm, AddSensorForm, DeviceService, Submission},
    error::{ControlError, FormError, RemoteError},
    readings::{format_timestamp, QueryOutcome, ReadingList, ReadingQuery, ReadingService},
    vocabulary::{actuator_model_label, device_type_label, sensor_model_label},
    weather::models::WeatherSnapshot,
};

pub const ROOMS_ERROR: &str = "Error fetching rooms. Please try again later.";
pub const DEVICES_ERROR: &str = "Error fetching devices. Please try again later.";
pub const NO_READINGS_AVAILABLE: &str = "There are no readings available.";
const LOADING: &str = "Loading...";

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HomeView {
    pub house: Option<House>,
    pub weather: WeatherSnapshot,
}

impl fmt::Display for HomeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.house {
            Some(house) => {
                writeln!(f, "{}", house.house_name.as_deref().unwrap_or("Home"))?;
                let street = [house.street_name.as_deref(), house.street_number.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                let place = [house.zip_code.as_deref(), house.city.as_deref(), house.country.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ");
                for line in [street, place] {
                    if !line.is_empty() {
                        writeln!(f, "  {line}")?;
                    }
                }
                writeln!(f, "  ({:.4}, {:.4})", house.latitude, house.longitude)?;
            }
            None => writeln!(f, "House unavailable")?,
        }

        let sunrise = self.weather.sunrise.as_deref().unwrap_or(LOADING);
        let sunset = self.weather.sunset.as_deref().unwrap_or(LOADING);
        writeln!(f, "Sunrise: {sunrise}")?;
        writeln!(f, "Sunset: {sunset}")?;
        match self.weather.temperature {
            Some(t) => write!(f, "Current Temperature: {t}°C"),
            None => write!(f, "Current Temperature: {LOADING}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RoomsView {
    pub rooms: Vec<Room>,
    pub error: Option<&'static str>,
}

impl fmt::Display for RoomsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = self.error {
            return write!(f, "{error}");
        }
        writeln!(f, "Rooms")?;
        for (i, room) in self.rooms.iter().enumerate() {
            writeln!(f, "{}. {} [{}]", i + 1, room.room_name, room.room_id)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub room_id: String,
    pub room: Option<Room>,
    pub devices: Vec<Device>,
    pub error: Option<&'static str>,
}

impl RoomView {
    /// Submit `form`; the device is listed only once the backend created it.
    pub async fn add_device(
        &mut self,
        service: &DeviceService,
        form: &mut AddDeviceForm,
    ) -> Result<Submission<Device>, FormError> {
        let submission = service.add_device(&self.room_id, form).await?;
        if let Submission::Created(device) = &submission {
            self.devices.push(device.clone());
        }
        Ok(submission)
    }
}

impl fmt::Display for RoomView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.room {
            Some(room) => {
                writeln!(f, "{}", room.room_name)?;
                writeln!(f, "  Floor: {}", room.floor)?;
                writeln!(
                    f,
                    "  Dimensions: {} x {} x {} (L x W x H)",
                    room.length, room.width, room.height
                )?;
            }
            None => writeln!(f, "Room {}", self.room_id)?,
        }

        if let Some(error) = self.error {
            return write!(f, "{error}");
        }
        writeln!(f, "Devices")?;
        for device in &self.devices {
            writeln!(
                f,
                "  {} | {} | {} [{}]",
                device.device_name,
                device_type_label(&device.device_type_name),
                if device.is_active() { "Active" } else { "Inactive" },
                device.device_id
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A device with its sensors, actuators and blind roller controls.
pub struct DeviceView {
    pub device: Device,
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<Actuator>,
    /// Messages of the last failed child fetches.
    pub errors: Vec<String>,
    controls: ActuatorControls,
    control_views: Vec<ControlView>,
}

impl DeviceView {
    pub(crate) fn new(device: Device, controls: ActuatorControls) -> Self {
        Self {
            device,
            sensors: Vec::new(),
            actuators: Vec::new(),
            errors: Vec::new(),
            controls,
            control_views: Vec::new(),
        }
    }

    pub fn controls(&self) -> &ActuatorControls {
        &self.controls
    }

    pub fn control_views(&self) -> &[ControlView] {
        &self.control_views
    }

    /// Fetch sensors and actuators again. Each list is replaced as a whole
    /// when its aggregation succeeds and kept as it was otherwise.
    pub async fn reload(&mut self, backend: &HomeBackend) {
        let device_id = self.device.device_id.clone();
        let (sensors, actuators) = tokio::join!(
            backend.sensors_of_device(&device_id),
            backend.actuators_of_device(&device_id),
        );

        self.errors.clear();
        match sensors {
            Ok(sensors) => self.sensors = sensors,
            Err(e) => self.errors.push(e.to_string()),
        }
        match actuators {
            Ok(actuators) => self.actuators = actuators,
            Err(e) => self.errors.push(e.to_string()),
        }

        self.controls.set_roster(&self.actuators).await;
        self.refresh_controls().await;
    }

    pub async fn refresh_controls(&mut self) {
        self.control_views = self.controls.views().await;
    }

    pub async fn add_sensor(
        &mut self,
        service: &DeviceService,
        form: &mut AddSensorForm,
    ) -> Result<Submission<Sensor>, FormError> {
        let submission = service.add_sensor(&self.device.device_id, form).await?;
        if let Submission::Created(sensor) = &submission {
            self.sensors.push(sensor.clone());
        }
        Ok(submission)
    }

    /// Submit `form`; a created actuator joins the roster, which resyncs the
    /// controls.
    pub async fn add_actuator(
        &mut self,
        service: &DeviceService,
        form: &mut AddActuatorForm,
    ) -> Result<Submission<Actuator>, FormError> {
        let submission = service.add_actuator(&self.device.device_id, form).await?;
        if let Submission::Created(actuator) = &submission {
            self.actuators.push(actuator.clone());
            self.controls.set_roster(&self.actuators).await;
            self.refresh_controls().await;
        }
        Ok(submission)
    }

    /// Move a control to `value` and send it.
    pub async fn operate(&mut self, actuator_id: &str, value: i32) -> Result<DispatchOutcome, ControlError> {
        self.controls.set_pending(actuator_id, value).await?;
        let outcome = self.controls.dispatch(actuator_id).await;
        self.refresh_controls().await;
        outcome
    }

    pub async fn deactivate(&mut self) -> Result<(), RemoteError> {
        self.controls.deactivate().await?;
        self.device.device_status = false;
        self.refresh_controls().await;
        Ok(())
    }
}

fn settings_summary(settings: &ActuatorSettings) -> Option<String> {
    match settings {
        ActuatorSettings::Limiter { lower, upper } => Some(format!("limits {lower}..{upper}")),
        ActuatorSettings::DecimalLimiter {
            lower,
            upper,
            precision,
        } => Some(format!("limits {lower}..{upper}, precision {precision}")),
        _ => None,
    }
}

impl fmt::Display for DeviceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.device;
        writeln!(f, "{} [{}]", d.device_name, d.device_id)?;
        writeln!(f, "  Type: {}", device_type_label(&d.device_type_name))?;
        writeln!(f, "  Status: {}", if d.is_active() { "Active" } else { "Inactive" })?;

        writeln!(f, "Sensors")?;
        for (i, sensor) in self.sensors.iter().enumerate() {
            writeln!(f, "  {}: {}", i + 1, sensor_model_label(&sensor.sensor_model_name))?;
        }

        writeln!(f, "Actuators")?;
        for (i, actuator) in self.actuators.iter().enumerate() {
            write!(f, "  {}: {}", i + 1, actuator_model_label(&actuator.actuator_model_name))?;
            if let Some(summary) = settings_summary(&actuator.settings) {
                write!(f, " ({summary})")?;
            }
            match self
                .control_views
                .iter()
                .find(|v| v.actuator_id == actuator.actuator_id)
            {
                Some(view) => writeln!(f, " {}", render_control(view))?,
                None => writeln!(f)?,
            }
        }

        for error in &self.errors {
            writeln!(f, "! {error}")?;
        }
        Ok(())
    }
}

fn render_control(view: &ControlView) -> String {
    let Some(value) = view.value else {
        return format!("[{LOADING}]");
    };
    let state = match view.phase {
        ControlPhase::Dirty => format!(" (confirmed {}%)", value.confirmed),
        ControlPhase::Dispatching => " (sending)".to_owned(),
        _ => String::new(),
    };
    let lock = if view.interactive { "" } else { " [locked]" };
    format!("[{}%{state}]{lock}", value.pending)
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Reading query form and, after a successful query, its result list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingsView {
    pub device_id: String,
    start: String,
    end: String,
    error: Option<String>,
    results: Option<ReadingList>,
    /// The last query succeeded and found nothing.
    no_readings: bool,
}

impl ReadingsView {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn set_start(&mut self, start: impl Into<String>) {
        self.start = start.into();
        self.error = None;
    }

    pub fn set_end(&mut self, end: impl Into<String>) {
        self.end = end.into();
        self.error = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn results(&self) -> Option<&ReadingList> {
        self.results.as_ref()
    }

    pub fn has_no_readings(&self) -> bool {
        self.no_readings
    }

    pub fn toggle_order(&mut self) {
        if let Some(results) = &mut self.results {
            results.toggle_order();
        }
    }

    /// Run the query. Validation and retrieval failures stay on the form;
    /// "no readings" keeps the form with a notice.
    pub async fn submit(&mut self, service: &ReadingService) {
        self.no_readings = false;
        let query = match ReadingQuery::from_form(&self.device_id, &self.start, &self.end) {
            Ok(query) => query,
            Err(e) => {
                self.error = Some(e.to_string());
                return;
            }
        };

        match service.query(&query).await {
            Ok(QueryOutcome::Readings(list)) => {
                self.error = None;
                self.results = Some(list);
            }
            Ok(QueryOutcome::NoReadings) => {
                self.error = None;
                self.results = None;
                self.no_readings = true;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

impl fmt::Display for ReadingsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(results) = &self.results else {
            writeln!(f, "Readings for device {}", self.device_id)?;
            writeln!(f, "  From: {}", self.start)?;
            writeln!(f, "  To: {}", self.end)?;
            if let Some(error) = &self.error {
                writeln!(f, "! {error}")?;
            }
            if self.no_readings {
                writeln!(f, "{NO_READINGS_AVAILABLE}")?;
            }
            return Ok(());
        };

        writeln!(f, "Readings ({:?})", results.order())?;
        for row in results.rows() {
            writeln!(
                f,
                "  {} | {} | {}",
                row.sensor_label,
                row.reading.reading_value,
                format_timestamp(&row.reading.timestamp)
            )?;
        }
        Ok(())
    }
}
