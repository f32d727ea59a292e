use std::time::Duration;

use chrono::NaiveDateTime;
use futures::future::join_all;
use tracing::{info, warn};

use crate::{
    backend::{models::Reading, HomeBackend},
    error::QueryError,
    label_cache::SensorLabelCache,
    notice::{NoticeBoard, NoticeKind},
    vocabulary::sensor_model_label,
};

pub const NO_READINGS: &str = "No readings found for the requested period.";

/// Layouts accepted for range bounds, tried in order.
const INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A validated reading query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingQuery {
    pub device_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReadingQuery {
    /// Validate raw form input. Both bounds are required; whether the range
    /// itself makes sense is for the backend to judge.
    pub fn from_form(device_id: &str, start: &str, end: &str) -> Result<Self, QueryError> {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return Err(QueryError::MissingBounds);
        }
        Ok(Self {
            device_id: device_id.to_owned(),
            start: parse_bound(start)?,
            end: parse_bound(end)?,
        })
    }
}

fn parse_bound(raw: &str) -> Result<NaiveDateTime, QueryError> {
    INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or(QueryError::InvalidRange)
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRow {
    /// Index in retrieval order.
    pub position: usize,
    pub reading: Reading,
    /// Sensor model label, or the raw sensor id when it could not be
    /// resolved.
    pub sensor_label: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Retrieved readings. Reordered locally, never refetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingList {
    rows: Vec<ReadingRow>,
    order: SortOrder,
}

impl ReadingList {
    pub fn new(rows: Vec<ReadingRow>) -> Self {
        let mut list = Self {
            rows,
            order: SortOrder::Ascending,
        };
        list.sort();
        list
    }

    pub fn rows(&self) -> &[ReadingRow] {
        &self.rows
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn set_order(&mut self, order: SortOrder) {
        self.order = order;
        self.sort();
    }

    pub fn toggle_order(&mut self) {
        self.set_order(self.order.toggled());
    }

    /// Equal timestamps keep retrieval order in both directions.
    fn sort(&mut self) {
        let order = self.order;
        self.rows.sort_by(|a, b| {
            let by_time = a.reading.timestamp.cmp(&b.reading.timestamp);
            let by_time = match order {
                SortOrder::Ascending => by_time,
                SortOrder::Descending => by_time.reverse(),
            };
            by_time.then(a.position.cmp(&b.position))
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Readings(ReadingList),
    /// The backend has nothing for the range. Not an error.
    NoReadings,
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format("Date: %Y-%m-%d Time: %H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ReadingService {
    backend: HomeBackend,
    labels: SensorLabelCache,
    notices: NoticeBoard,
    empty_notice_ttl: Duration,
}

impl ReadingService {
    pub fn new(
        backend: HomeBackend,
        labels: SensorLabelCache,
        notices: NoticeBoard,
        empty_notice_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            labels,
            notices,
            empty_notice_ttl,
        }
    }

    pub async fn query(&self, query: &ReadingQuery) -> Result<QueryOutcome, QueryError> {
        let readings = match self
            .backend
            .readings_of_device(&query.device_id, query.start, query.end)
            .await
        {
            Ok(readings) => readings,
            Err(e) => match e.collection_status() {
                Some(404) => Vec::new(),
                Some(400) => {
                    return Err(match e.remote().reason() {
                        Some(reason) => QueryError::RangeRejected(reason.to_owned()),
                        None => QueryError::InvalidRange,
                    })
                }
                _ => {
                    warn!(device_id = %query.device_id, error = %e, "Reading query failed");
                    return Err(QueryError::Retrieval(e));
                }
            },
        };

        if readings.is_empty() {
            self.notices
                .flash(NoticeKind::Info, NO_READINGS, self.empty_notice_ttl);
            return Ok(QueryOutcome::NoReadings);
        }

        self.resolve_labels(&readings).await;

        let mut rows = Vec::with_capacity(readings.len());
        for (position, reading) in readings.into_iter().enumerate() {
            let sensor_label = self
                .labels
                .get(&reading.sensor_id)
                .await
                .unwrap_or_else(|| reading.sensor_id.clone());
            rows.push(ReadingRow {
                position,
                reading,
                sensor_label,
            });
        }

        info!(device_id = %query.device_id, count = rows.len(), "Readings retrieved");
        Ok(QueryOutcome::Readings(ReadingList::new(rows)))
    }

    /// Look up every sensor not yet in the label cache, once each,
    /// concurrently. Failed lookups are left out of the cache.
    async fn resolve_labels(&self, readings: &[Reading]) {
        let missing = self
            .labels
            .missing(readings.iter().map(|r| r.sensor_id.as_str()))
            .await;

        join_all(missing.iter().map(|sensor_id| async move {
            match self.backend.sensor(sensor_id).await {
                Ok(sensor) => {
                    self.labels
                        .insert(sensor_id.as_str(), sensor_model_label(&sensor.sensor_model_name))
                        .await;
                }
                Err(e) => {
                    warn!(sensor_id = %sensor_id, error = %e, "Failed to resolve sensor label");
                }
            }
        }))
        .await;
    }
}
