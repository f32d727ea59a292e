mod screens;

use std::{fmt, sync::Arc, time::Duration};

use tracing::warn;

use crate::{
    backend::{models::House, HomeBackend},
    config::Config,
    control::{ActuatorControls, ControlTiming},
    devices::DeviceService,
    error::RemoteError,
    label_cache::SensorLabelCache,
    notice::NoticeBoard,
    readings::ReadingService,
    remote::{HttpTransport, RemoteClient},
    weather::{models::WeatherSnapshot, WeatherClient, WeatherService},
};

pub use screens::{
    DeviceView, HomeView, ReadingsView, RoomView, RoomsView, DEVICES_ERROR, NO_READINGS_AVAILABLE,
    ROOMS_ERROR,
};

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Rooms,
    Room { room_id: String },
    Device { device_id: String, room_id: String },
    Readings { device_id: String },
}

/// Back stack of visited routes. `Home` is always at the bottom.
#[derive(Debug, Clone)]
pub struct Navigator {
    stack: Vec<Route>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            stack: vec![Route::Home],
        }
    }
}

impl Navigator {
    pub fn current(&self) -> &Route {
        // The stack never drops below the root.
        &self.stack[self.stack.len() - 1]
    }

    pub fn push(&mut self, route: Route) {
        if self.current() != &route {
            self.stack.push(route);
        }
    }

    /// Leave the current route. Returns the route to show, which the caller
    /// loads again (e.g. a room re-fetches its devices).
    pub fn back(&mut self) -> &Route {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self.current()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// A loaded screen.
pub enum Screen {
    Home(HomeView),
    Rooms(RoomsView),
    Room(RoomView),
    Device(DeviceView),
    Readings(ReadingsView),
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Home(view) => fmt::Display::fmt(view, f),
            Screen::Rooms(view) => fmt::Display::fmt(view, f),
            Screen::Room(view) => fmt::Display::fmt(view, f),
            Screen::Device(view) => fmt::Display::fmt(view, f),
            Screen::Readings(view) => fmt::Display::fmt(view, f),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardTiming {
    pub controls: ControlTiming,
    pub empty_notice_ttl: Duration,
    pub weather_refresh: Duration,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Wires the services together and builds the screens.
#[derive(Clone)]
pub struct Dashboard {
    backend: HomeBackend,
    weather: Option<WeatherClient>,
    devices: DeviceService,
    readings: ReadingService,
    notices: NoticeBoard,
    timing: DashboardTiming,
}

impl Dashboard {
    pub fn new(backend: HomeBackend, weather: Option<WeatherClient>, timing: DashboardTiming) -> Self {
        let notices = NoticeBoard::new();
        Self {
            devices: DeviceService::new(backend.clone()),
            readings: ReadingService::new(
                backend.clone(),
                SensorLabelCache::new(),
                notices.clone(),
                timing.empty_notice_ttl,
            ),
            backend,
            weather,
            notices,
            timing,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let transport = HttpTransport::new(&config.api_url, config.request_timeout)?;
        let backend = HomeBackend::new(
            RemoteClient::new("backend", Arc::new(transport)),
            config.house_id.clone(),
        );

        let weather = match &config.weather_api_url {
            Some(url) => {
                let transport = HttpTransport::new(url, config.request_timeout)?;
                Some(WeatherClient::new(
                    RemoteClient::new("weather", Arc::new(transport)),
                    config.weather_group_number,
                ))
            }
            None => None,
        };

        Ok(Self::new(
            backend,
            weather,
            DashboardTiming {
                controls: ControlTiming {
                    dispatch_delay: config.dispatch_delay,
                    notice_ttl: config.notice_timeout,
                },
                empty_notice_ttl: config.empty_notice_timeout,
                weather_refresh: config.weather_refresh,
            },
        ))
    }

    pub fn devices(&self) -> &DeviceService {
        &self.devices
    }

    pub fn readings(&self) -> &ReadingService {
        &self.readings
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Weather refresher for the house location, when a weather service is
    /// configured.
    pub fn weather_service(&self, house: &House) -> Option<WeatherService> {
        self.weather.clone().map(|client| {
            WeatherService::new(client, house.latitude, house.longitude, self.timing.weather_refresh)
        })
    }

    pub async fn home(&self) -> HomeView {
        let house = match self.backend.house().await {
            Ok(house) => Some(house),
            Err(e) => {
                warn!(error = %e, "Failed to fetch house");
                None
            }
        };

        let weather = match house.as_ref().and_then(|h| self.weather_service(h)) {
            Some(service) => service.load_once().await,
            None => WeatherSnapshot::default(),
        };

        HomeView { house, weather }
    }

    pub async fn rooms(&self) -> RoomsView {
        match self.backend.rooms().await {
            Ok(rooms) => RoomsView { rooms, error: None },
            Err(e) => {
                warn!(error = %e, "Failed to fetch rooms");
                RoomsView {
                    rooms: Vec::new(),
                    error: Some(ROOMS_ERROR),
                }
            }
        }
    }

    pub async fn room(&self, room_id: &str) -> RoomView {
        let (room, devices) = tokio::join!(
            self.backend.room(room_id),
            self.backend.devices_of_room(room_id),
        );

        let room = room
            .inspect_err(|e| warn!(room_id = %room_id, error = %e, "Failed to fetch room"))
            .ok();
        let (devices, error) = match devices {
            Ok(devices) => (devices, None),
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Failed to fetch devices");
                (Vec::new(), Some(DEVICES_ERROR))
            }
        };

        RoomView {
            room_id: room_id.to_owned(),
            room,
            devices,
            error,
        }
    }

    pub async fn device(&self, device_id: &str) -> Result<DeviceView, RemoteError> {
        let device = self.backend.device(device_id).await?;
        let controls = ActuatorControls::new(
            self.backend.clone(),
            self.notices.clone(),
            self.timing.controls,
            &device,
        );
        let mut view = DeviceView::new(device, controls);
        view.reload(&self.backend).await;
        Ok(view)
    }

    pub fn readings_view(&self, device_id: &str) -> ReadingsView {
        ReadingsView::new(device_id)
    }

    /// Load `route` from scratch. Called for every route shown, including the
    /// one [`Navigator::back`] returns to, so a room revisited from one of its
    /// devices lists its devices again.
    pub async fn show(&self, route: &Route) -> Result<Screen, RemoteError> {
        Ok(match route {
            Route::Home => Screen::Home(self.home().await),
            Route::Rooms => Screen::Rooms(self.rooms().await),
            Route::Room { room_id } => Screen::Room(self.room(room_id).await),
            Route::Device { device_id, .. } => Screen::Device(self.device(device_id).await?),
            Route::Readings { device_id } => Screen::Readings(self.readings_view(device_id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        control::DispatchOutcome,
        devices::{AddDeviceForm, Submission, INVALID_DEVICE_NAME},
        remote::{memory::MemoryTransport, ApiRequest},
    };

    fn dashboard() -> (Arc<MemoryTransport>, Dashboard) {
        let transport = Arc::new(MemoryTransport::new());
        let backend = HomeBackend::new(RemoteClient::new("backend", transport.clone()), "TheHouse");
        let timing = DashboardTiming {
            controls: ControlTiming {
                dispatch_delay: Duration::from_millis(10),
                notice_ttl: Duration::from_millis(10),
            },
            empty_notice_ttl: Duration::from_millis(10),
            weather_refresh: Duration::from_secs(900),
        };
        (transport, Dashboard::new(backend, None, timing))
    }

    fn device_json(id: &str, active: bool) -> Value {
        json!({
            "deviceId": id,
            "deviceName": "Blinds",
            "deviceTypeName": "GridPowerMeter",
            "roomId": "r1",
            "deviceStatus": active
        })
    }

    #[test]
    fn back_returns_to_the_previous_route() {
        let mut nav = Navigator::default();
        nav.push(Route::Rooms);
        nav.push(Route::Room { room_id: "r1".to_owned() });
        nav.push(Route::Device {
            device_id: "d1".to_owned(),
            room_id: "r1".to_owned(),
        });

        assert_eq!(nav.back(), &Route::Room { room_id: "r1".to_owned() });
        assert_eq!(nav.back(), &Route::Rooms);
        assert_eq!(nav.back(), &Route::Home);
        assert_eq!(nav.back(), &Route::Home);
        assert_eq!(nav.depth(), 1);
    }

    #[tokio::test]
    async fn going_back_to_a_room_refetches_its_devices() {
        let (transport, dashboard) = dashboard();
        transport.respond_json(ApiRequest::get("/devices/room/r1"), 200, json!([{"deviceId": "d1"}]));
        transport.respond_json(ApiRequest::get("/devices/d1"), 200, device_json("d1", true));
        transport.respond(ApiRequest::get("/sensors/device/d1"), 404, "");
        transport.respond(ApiRequest::get("/actuators/device/d1"), 404, "");

        let mut nav = Navigator::default();
        nav.push(Route::Room { room_id: "r1".to_owned() });
        let Screen::Room(room) = dashboard.show(nav.current()).await.unwrap() else {
            panic!("expected the room screen");
        };
        assert_eq!(room.devices.len(), 1);

        nav.push(Route::Device {
            device_id: "d1".to_owned(),
            room_id: "r1".to_owned(),
        });
        let screen = dashboard.show(nav.current()).await.unwrap();
        assert!(matches!(screen, Screen::Device(_)));

        let previous = nav.back().clone();
        let Screen::Room(room) = dashboard.show(&previous).await.unwrap() else {
            panic!("expected the room screen");
        };
        assert_eq!(room.room_id, "r1");
        assert_eq!(transport.count("/devices/room/r1"), 2);
    }

    #[tokio::test]
    async fn rooms_failure_shows_a_message() {
        let (transport, dashboard) = dashboard();
        transport.respond_json(ApiRequest::get("/rooms"), 200, json!({"rooms": []}));

        let view = dashboard.rooms().await;
        assert_eq!(view.error, Some(ROOMS_ERROR));
        assert_eq!(view.to_string(), ROOMS_ERROR);
    }

    #[tokio::test]
    async fn invalid_device_leaves_room_list_unchanged() {
        let (transport, dashboard) = dashboard();
        transport.respond_json(ApiRequest::get("/devices/room/r1"), 200, json!([{"deviceId": "d1"}]));
        transport.respond_json(ApiRequest::get("/devices/d1"), 200, device_json("d1", true));

        let mut room = dashboard.room("r1").await;
        assert_eq!(room.devices.len(), 1);

        let mut form = AddDeviceForm::default();
        form.set_device_type("GridPowerMeter");
        let result = room.add_device(dashboard.devices(), &mut form).await.unwrap();

        assert_eq!(result, Submission::Invalid);
        assert_eq!(form.errors().get(crate::devices::Field::DeviceName), Some(INVALID_DEVICE_NAME));
        assert_eq!(room.devices.len(), 1);
        assert_eq!(transport.count("/devices/room/r1"), 1);
    }

    #[tokio::test]
    async fn device_screen_syncs_and_operates_controls() {
        let (transport, dashboard) = dashboard();
        transport.respond_json(ApiRequest::get("/devices/d1"), 200, device_json("d1", true));
        transport.respond(ApiRequest::get("/sensors/device/d1"), 404, "");
        transport.respond_json(ApiRequest::get("/actuators/device/d1"), 200, json!([{"actuatorId": "a1"}]));
        transport.respond_json(
            ApiRequest::get("/actuators/a1"),
            200,
            json!({"actuatorId": "a1", "deviceId": "d1", "actuatorModelName": "ActuatorOfBlindRoller"}),
        );
        transport.respond_json(
            ApiRequest::get("/actuators/a1/current-percentage-value"),
            200,
            json!({"value": 40}),
        );
        transport.respond(ApiRequest::put("/actuators/a1/operate-blind-roller"), 200, "");

        let mut view = dashboard.device("d1").await.unwrap();
        assert!(view.sensors.is_empty());
        assert!(view.errors.is_empty());
        assert_eq!(view.control_views()[0].value.unwrap().confirmed, 40);

        let outcome = view.operate("a1", 70).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Confirmed(70));
        assert!(view.to_string().contains("Blinds Roller Actuator [70%]"));
    }
}
