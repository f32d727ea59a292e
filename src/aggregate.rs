//! Collection → detail aggregation.
//!
//! A collection endpoint answers with shallow member references. Each member
//! is expanded by a detail fetch keyed on its identifier, all detail fetches
//! run concurrently, and the detail fields are merged over the base fields.
//! The result keeps collection order and is all-or-nothing.

use chrono::NaiveDateTime;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    error::{AggregateError, RemoteError},
    remote::{ApiRequest, Outcome, RemoteClient},
};

/// Timestamp layout the backend expects for reading range bounds.
pub const PERIOD_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Where the member list sits inside a collection payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    /// The payload is the list.
    Array,
    /// The list is `payload._embedded.<key>`.
    Embedded(&'static str),
}

impl ListShape {
    pub fn members(self, payload: Value) -> Result<Vec<Value>, RemoteError> {
        let list = match self {
            ListShape::Array => payload,
            ListShape::Embedded(key) => match payload {
                Value::Object(mut map) => match map.remove("_embedded") {
                    Some(Value::Object(mut embedded)) => embedded
                        .remove(key)
                        .ok_or_else(|| RemoteError::Format(format!("_embedded.{key} is missing")))?,
                    _ => return Err(RemoteError::Format("_embedded container is missing".to_owned())),
                },
                _ => return Err(RemoteError::Format("expected a JSON object".to_owned())),
            },
        };

        match list {
            Value::Array(items) => Ok(items),
            other => Err(RemoteError::Format(format!(
                "expected a list of members, got {}",
                kind(&other)
            ))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// A collection endpoint together with how to expand its members.
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: &'static str,
    pub list: ApiRequest,
    pub shape: ListShape,
    /// Member field holding the identifier used for the detail fetch.
    pub id_field: &'static str,
    /// Detail path is `{detail_prefix}/{id}`.
    pub detail_prefix: &'static str,
    /// Treat a `404` on the collection fetch as "no members".
    pub missing_is_empty: bool,
}

impl Collection {
    pub fn rooms() -> Self {
        Self {
            name: "rooms",
            list: ApiRequest::get("/rooms"),
            shape: ListShape::Embedded("rooms"),
            id_field: "roomId",
            detail_prefix: "/rooms",
            missing_is_empty: false,
        }
    }

    pub fn devices_of_room(room_id: &str) -> Self {
        Self {
            name: "devices",
            list: ApiRequest::get(format!("/devices/room/{room_id}")),
            shape: ListShape::Array,
            id_field: "deviceId",
            detail_prefix: "/devices",
            missing_is_empty: false,
        }
    }

    pub fn sensors_of_device(device_id: &str) -> Self {
        Self {
            name: "sensors",
            list: ApiRequest::get(format!("/sensors/device/{device_id}")),
            shape: ListShape::Array,
            id_field: "sensorId",
            detail_prefix: "/sensors",
            missing_is_empty: true,
        }
    }

    pub fn actuators_of_device(device_id: &str) -> Self {
        Self {
            name: "actuators",
            list: ApiRequest::get(format!("/actuators/device/{device_id}")),
            shape: ListShape::Array,
            id_field: "actuatorId",
            detail_prefix: "/actuators",
            missing_is_empty: true,
        }
    }

    /// Readings report "nothing in range" as a `404`; that is left to the
    /// caller to interpret.
    pub fn readings_of_device(device_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            name: "readings",
            list: ApiRequest::get(format!("/readings/device/{device_id}"))
                .with_query("startPeriod", start.format(PERIOD_FORMAT))
                .with_query("endPeriod", end.format(PERIOD_FORMAT)),
            shape: ListShape::Array,
            id_field: "readingId",
            detail_prefix: "/readings",
            missing_is_empty: false,
        }
    }

    fn collection_error(&self, source: RemoteError) -> AggregateError {
        AggregateError::Collection {
            collection: self.name,
            source,
        }
    }

    fn detail_error(&self, id: &str, source: RemoteError) -> AggregateError {
        AggregateError::Detail {
            collection: self.name,
            id: id.to_owned(),
            source,
        }
    }

    fn member_id(&self, member: &Map<String, Value>) -> Option<String> {
        match member.get(self.id_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Fetch `collection`, expand every member through its detail endpoint and
/// decode the merged records as `T`.
///
/// Records come back in collection order. Any failure, at the collection or
/// at a single member, fails the whole batch.
pub async fn fetch_detailed<T: DeserializeOwned>(
    remote: &RemoteClient,
    collection: &Collection,
) -> Result<Vec<T>, AggregateError> {
    let payload = match remote.call(&collection.list).await {
        Ok(Outcome::Data(payload)) => payload,
        Ok(Outcome::Empty) => {
            return Err(collection.collection_error(RemoteError::Format(
                "empty collection response".to_owned(),
            )))
        }
        Err(e) if collection.missing_is_empty && e.status() == Some(404) => {
            debug!(collection = collection.name, "Collection not found, treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(collection.collection_error(e)),
    };

    let members = collection
        .shape
        .members(payload)
        .map_err(|e| collection.collection_error(e))?;

    let mut keyed = Vec::with_capacity(members.len());
    for (index, member) in members.into_iter().enumerate() {
        let Value::Object(base) = member else {
            return Err(collection.collection_error(RemoteError::Format(format!(
                "member {index} is not an object"
            ))));
        };
        let id = collection.member_id(&base).ok_or_else(|| {
            collection.collection_error(RemoteError::Format(format!(
                "member {index} has no {}",
                collection.id_field
            )))
        })?;
        keyed.push((id, base));
    }

    let details = try_join_all(keyed.iter().map(|(id, _)| async move {
        let path = format!("{}/{}", collection.detail_prefix, id);
        remote
            .fetch(&ApiRequest::get(path))
            .await
            .map_err(|e| collection.detail_error(id, e))
    }))
    .await?;

    let mut records = Vec::with_capacity(keyed.len());
    for ((id, mut base), detail) in keyed.into_iter().zip(details) {
        let Value::Object(fields) = detail else {
            return Err(collection.detail_error(
                &id,
                RemoteError::Format("detail is not an object".to_owned()),
            ));
        };
        base.extend(fields);
        let record = serde_json::from_value(Value::Object(base))
            .map_err(|e| collection.detail_error(&id, RemoteError::Format(e.to_string())))?;
        records.push(record);
    }

    info!(collection = collection.name, count = records.len(), "Aggregated collection");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::remote::memory::MemoryTransport;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct RoomRow {
        room_id: String,
        room_name: String,
        floor: i32,
    }

    fn setup() -> (Arc<MemoryTransport>, RemoteClient) {
        let transport = Arc::new(MemoryTransport::new());
        let remote = RemoteClient::new("backend", transport.clone());
        (transport, remote)
    }

    fn room_list(ids: &[&str]) -> Value {
        let rooms: Vec<Value> = ids.iter().map(|id| json!({"roomId": id})).collect();
        json!({"_embedded": {"rooms": rooms}, "_links": {}})
    }

    #[tokio::test(start_paused = true)]
    async fn merged_records_keep_collection_order() {
        let (transport, remote) = setup();
        transport.respond_json(ApiRequest::get("/rooms"), 200, room_list(&["r1", "r2", "r3"]));
        for (id, delay) in [("r1", 30), ("r2", 10), ("r3", 20)] {
            transport.respond_json_after(
                ApiRequest::get(format!("/rooms/{id}")),
                200,
                json!({"roomName": format!("Room {id}"), "floor": 1}),
                Duration::from_millis(delay),
            );
        }

        let rooms: Vec<RoomRow> = fetch_detailed(&remote, &Collection::rooms()).await.unwrap();
        let ids: Vec<&str> = rooms.iter().map(|r| r.room_id.as_str()).collect();
        assert_eq!(ids, ["r1", "r2", "r3"]);
        assert_eq!(rooms[1].room_name, "Room r2");
    }

    #[tokio::test(start_paused = true)]
    async fn detail_fetches_run_concurrently() {
        let (transport, remote) = setup();
        transport.respond_json(ApiRequest::get("/rooms"), 200, room_list(&["r1", "r2", "r3"]));
        for id in ["r1", "r2", "r3"] {
            transport.respond_json_after(
                ApiRequest::get(format!("/rooms/{id}")),
                200,
                json!({"roomName": id, "floor": 0}),
                Duration::from_millis(100),
            );
        }

        let started = tokio::time::Instant::now();
        let rooms: Vec<RoomRow> = fetch_detailed(&remote, &Collection::rooms()).await.unwrap();
        assert_eq!(rooms.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn one_failing_detail_fails_the_batch() {
        let (transport, remote) = setup();
        transport.respond_json(ApiRequest::get("/rooms"), 200, room_list(&["r1", "r2"]));
        transport.respond_json(ApiRequest::get("/rooms/r1"), 200, json!({"roomName": "a", "floor": 0}));
        transport.respond(ApiRequest::get("/rooms/r2"), 500, "");

        let err = fetch_detailed::<RoomRow>(&remote, &Collection::rooms())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AggregateError::Detail {
                collection: "rooms",
                id: "r2".to_owned(),
                source: RemoteError::Status { status: 500, reason: None },
            }
        );
    }

    #[tokio::test]
    async fn detail_fields_override_base_fields() {
        let (transport, remote) = setup();
        transport.respond_json(
            ApiRequest::get("/rooms"),
            200,
            json!({"_embedded": {"rooms": [{"roomId": "r1", "roomName": "stale", "floor": 0}]}}),
        );
        transport.respond_json(ApiRequest::get("/rooms/r1"), 200, json!({"roomName": "Kitchen"}));

        let rooms: Vec<RoomRow> = fetch_detailed(&remote, &Collection::rooms()).await.unwrap();
        assert_eq!(
            rooms,
            [RoomRow { room_id: "r1".to_owned(), room_name: "Kitchen".to_owned(), floor: 0 }]
        );
    }

    #[tokio::test]
    async fn unrecognised_shape_is_a_collection_error() {
        let (transport, remote) = setup();
        transport.respond_json(ApiRequest::get("/rooms"), 200, json!([{"roomId": "r1"}]));

        let err = fetch_detailed::<RoomRow>(&remote, &Collection::rooms())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Collection { collection: "rooms", source: RemoteError::Format(_) }
        ));
        assert_eq!(transport.total(), 1);
    }

    #[tokio::test]
    async fn member_without_identifier_is_a_collection_error() {
        let (transport, remote) = setup();
        transport.respond_json(
            ApiRequest::get("/devices/room/r1"),
            200,
            json!([{"deviceId": "d1"}, {"deviceName": "orphan"}]),
        );

        let err = fetch_detailed::<Value>(&remote, &Collection::devices_of_room("r1"))
            .await
            .unwrap_err();
        assert_eq!(
            err.remote(),
            &RemoteError::Format("member 1 has no deviceId".to_owned())
        );
        // Nothing is expanded once the shape is known to be bad.
        assert_eq!(transport.count("/devices/d1"), 0);
    }

    #[tokio::test]
    async fn missing_device_children_are_empty() {
        let (transport, remote) = setup();
        transport.respond(ApiRequest::get("/sensors/device/d1"), 404, "");

        let sensors: Vec<Value> = fetch_detailed(&remote, &Collection::sensors_of_device("d1"))
            .await
            .unwrap();
        assert!(sensors.is_empty());

        // Readings keep the 404 for the caller.
        let start = NaiveDateTime::parse_from_str("2024-05-01T00:00:00", PERIOD_FORMAT).unwrap();
        let end = NaiveDateTime::parse_from_str("2024-05-02T00:00:00", PERIOD_FORMAT).unwrap();
        let err = fetch_detailed::<Value>(&remote, &Collection::readings_of_device("d1", start, end))
            .await
            .unwrap_err();
        assert_eq!(err.collection_status(), Some(404));
    }

    #[test]
    fn embedded_shape_requires_container() {
        let err = ListShape::Embedded("rooms")
            .members(json!({"_links": {}}))
            .unwrap_err();
        assert_eq!(err, RemoteError::Format("_embedded container is missing".to_owned()));

        let members = ListShape::Array.members(json!([1, 2])).unwrap();
        assert_eq!(members.len(), 2);
    }
}
