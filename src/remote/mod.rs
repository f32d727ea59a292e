pub mod memory;
pub mod transport;

use std::{fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::RemoteError;

pub use self::transport::{ApiRequest, HttpTransport, RawResponse, Transport};

/// Classified result of a successful (2xx) call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A decoded JSON payload.
    Data(Value),
    /// The service answered 2xx with no body.
    Empty,
}

/// Issues calls against one remote service and classifies the answers.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<Inner>,
}

struct Inner {
    /// Service name used in log fields.
    name: &'static str,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    pub fn new(name: &'static str, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner { name, transport }),
        }
    }

    /// Issue `request` and classify the answer. Non-2xx statuses come back as
    /// `RemoteError::Status`, never as a panic or a transport error.
    pub async fn call(&self, request: &ApiRequest) -> Result<Outcome, RemoteError> {
        debug!(
            service = self.inner.name,
            method = %request.method,
            path = %request.path,
            "Calling remote"
        );

        let raw = match self.inner.transport.send(request).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(service = self.inner.name, path = %request.path, error = %e, "Remote call failed");
                return Err(e);
            }
        };

        let outcome = classify(raw);
        if let Err(RemoteError::Status { status, reason }) = &outcome {
            warn!(
                service = self.inner.name,
                path = %request.path,
                status,
                reason = reason.as_deref().unwrap_or(""),
                "Remote rejected request"
            );
        }
        outcome
    }

    /// Like [`call`](Self::call) but a payload is required.
    pub async fn fetch(&self, request: &ApiRequest) -> Result<Value, RemoteError> {
        match self.call(request).await? {
            Outcome::Data(value) => Ok(value),
            Outcome::Empty => Err(RemoteError::Format(format!(
                "empty response from {}",
                request.path
            ))),
        }
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, RemoteError> {
        let value = self.fetch(request).await?;
        serde_json::from_value(value)
            .map_err(|e| RemoteError::Format(format!("{}: {e}", request.path)))
    }
}

fn classify(raw: RawResponse) -> Result<Outcome, RemoteError> {
    if !(200..300).contains(&raw.status) {
        return Err(RemoteError::Status {
            status: raw.status,
            reason: backend_reason(&raw.body),
        });
    }

    if raw.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Outcome::Empty);
    }

    serde_json::from_slice(&raw.body)
        .map(Outcome::Data)
        .map_err(|e| RemoteError::Format(e.to_string()))
}

/// Best-effort extraction of a human reason from an error body: the
/// `message` (or `error`) field of a JSON object, a bare JSON string, or
/// plain text.
fn backend_reason(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => ["message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_owned()),
        Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Ok(_) => None,
        Err(_) => Some(text.to_owned()),
    }
}
