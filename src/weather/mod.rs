pub mod models;

use std::{sync::Arc, time::Duration};

use chrono::{Local, Timelike};
use thiserror::Error;
use tokio::{sync::watch, time};
use tracing::{error, info, warn};

use crate::{
    error::RemoteError,
    remote::{ApiRequest, RemoteClient},
};

use self::models::{
    ConfigurationReply, MeasurementReply, SunEvent, WeatherConfiguration, WeatherSnapshot,
    REJECTED_GROUP,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("weather service rejected the configuration")]
    Rejected,

    #[error("measurement unavailable: {0}")]
    Unavailable(String),
}

/// Client for the external weather service.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    remote: RemoteClient,
    group_number: i32,
}

impl WeatherClient {
    pub fn new(remote: RemoteClient, group_number: i32) -> Self {
        Self {
            remote,
            group_number,
        }
    }

    pub async fn configure(&self, latitude: f64, longitude: f64) -> Result<(), WeatherError> {
        let body = serde_json::to_value(WeatherConfiguration {
            group_number: self.group_number,
            latitude,
            longitude,
        })
        .map_err(|e| RemoteError::Format(e.to_string()))?;

        let reply: ConfigurationReply = self
            .remote
            .fetch_as(&ApiRequest::post("/WeatherServiceConfiguration", body))
            .await?;

        if reply.group_number == REJECTED_GROUP {
            return Err(WeatherError::Rejected);
        }
        Ok(())
    }

    /// Sunrise or sunset time, formatted `HH:MM`.
    pub async fn sun_time(&self, event: SunEvent, latitude: f64, longitude: f64) -> Result<String, WeatherError> {
        let request = ApiRequest::get("/SunriseOrSunsetTime")
            .with_query("groupNumber", self.group_number)
            .with_query("latitude", latitude)
            .with_query("longitude", longitude)
            .with_query("option", event.option());
        let reply: MeasurementReply = self.remote.fetch_as(&request).await?;

        reply
            .raw()
            .filter(|raw| !raw.is_empty())
            .map(|raw| format_sun_time(&raw))
            .ok_or_else(|| WeatherError::Unavailable(reply.info.clone().unwrap_or_default()))
    }

    /// Temperature in °C for `hour` of the current day.
    pub async fn temperature(&self, hour: u32, latitude: f64, longitude: f64) -> Result<f64, WeatherError> {
        let request = ApiRequest::get("/InstantaneousTemperature")
            .with_query("groupNumber", self.group_number)
            .with_query("hour", hour)
            .with_query("latitude", latitude)
            .with_query("longitude", longitude);
        let reply: MeasurementReply = self.remote.fetch_as(&request).await?;

        reply
            .as_f64()
            .ok_or_else(|| WeatherError::Unavailable(reply.info.clone().unwrap_or_default()))
    }
}

/// Render an `H.MM` measurement as `HH:MM`: hours are left-padded and
/// minutes right-padded with zeros.
pub fn format_sun_time(raw: &str) -> String {
    let (hour, minute) = raw.split_once('.').unwrap_or((raw, ""));
    format!("{hour:0>2}:{minute:0<2}")
}

/// Time left until the next quarter hour of the wall clock.
pub fn until_next_quarter_hour<T: Timelike>(now: &T) -> Duration {
    let into_quarter = Duration::from_secs(u64::from(now.minute() % 15) * 60 + u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    Duration::from_secs(15 * 60).saturating_sub(into_quarter)
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Keeps a [`WeatherSnapshot`] for the house location up to date.
pub struct WeatherService {
    client: WeatherClient,
    latitude: f64,
    longitude: f64,
    refresh: Duration,
    tx: Arc<watch::Sender<WeatherSnapshot>>,
}

impl WeatherService {
    pub fn new(client: WeatherClient, latitude: f64, longitude: f64, refresh: Duration) -> Self {
        let (tx, _rx) = watch::channel(WeatherSnapshot::default());
        Self {
            client,
            latitude,
            longitude,
            refresh,
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> WeatherSnapshot {
        self.tx.borrow().clone()
    }

    /// Configure the service, then load sun times and the temperature.
    ///
    /// The temperature is only asked for once the configuration was accepted.
    /// Failures leave the affected field empty.
    pub async fn load_once(&self) -> WeatherSnapshot {
        let (lat, lon) = (self.latitude, self.longitude);
        let (configured, sunrise, sunset) = tokio::join!(
            self.client.configure(lat, lon),
            self.client.sun_time(SunEvent::Sunrise, lat, lon),
            self.client.sun_time(SunEvent::Sunset, lat, lon),
        );

        let sunrise = sunrise
            .inspect_err(|e| warn!(error = %e, "Failed to fetch sunrise"))
            .ok();
        let sunset = sunset
            .inspect_err(|e| warn!(error = %e, "Failed to fetch sunset"))
            .ok();
        self.tx.send_modify(|snapshot| {
            snapshot.sunrise = sunrise;
            snapshot.sunset = sunset;
        });

        match configured {
            Ok(()) => self.refresh_temperature().await,
            Err(e) => error!(error = %e, "Weather service configuration failed"),
        }

        self.snapshot()
    }

    pub async fn refresh_temperature(&self) {
        let hour = Local::now().hour();
        match self.client.temperature(hour, self.latitude, self.longitude).await {
            Ok(temperature) => {
                info!(temperature, "Temperature updated");
                self.tx.send_modify(|snapshot| snapshot.temperature = Some(temperature));
            }
            Err(e) => warn!(error = %e, "Failed to fetch temperature"),
        }
    }

    /// Load once, then refresh the temperature at every quarter hour.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        self.load_once().await;

        time::sleep(until_next_quarter_hour(&Local::now())).await;
        info!(refresh_secs = self.refresh.as_secs(), "Weather refresh loop started");
        let mut ticker = time::interval(self.refresh);

        loop {
            ticker.tick().await;
            self.refresh_temperature().await;
        }
    }
}
