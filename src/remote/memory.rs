use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::RemoteError;

use super::transport::{ApiRequest, RawResponse, Transport};

/// Scripted in-process [`Transport`].
///
/// Routes on method and path (the query string is ignored). Each route holds
/// a queue of replies; replies are consumed in order and the last one keeps
/// answering. Unrouted requests get a `404` with an empty body.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    routes: HashMap<(Method, String), VecDeque<Scripted>>,
    log: Vec<ApiRequest>,
}

#[derive(Clone)]
struct Scripted {
    reply: Reply,
    delay: Duration,
}

#[derive(Clone)]
enum Reply {
    Respond(RawResponse),
    Fail(RemoteError),
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, request: ApiRequest, reply: Reply, delay: Duration) {
        self.state()
            .routes
            .entry((request.method, request.path))
            .or_default()
            .push_back(Scripted { reply, delay });
    }

    pub fn respond(&self, request: ApiRequest, status: u16, body: &str) {
        self.respond_after(request, status, body, Duration::ZERO);
    }

    pub fn respond_after(&self, request: ApiRequest, status: u16, body: &str, delay: Duration) {
        let raw = RawResponse {
            status,
            body: body.as_bytes().to_vec(),
        };
        self.push(request, Reply::Respond(raw), delay);
    }

    pub fn respond_json(&self, request: ApiRequest, status: u16, body: Value) {
        self.respond_json_after(request, status, body, Duration::ZERO);
    }

    pub fn respond_json_after(&self, request: ApiRequest, status: u16, body: Value, delay: Duration) {
        self.respond_after(request, status, &body.to_string(), delay);
    }

    pub fn fail(&self, request: ApiRequest, error: RemoteError) {
        self.push(request, Reply::Fail(error), Duration::ZERO);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state().log.clone()
    }

    /// Number of requests received for `path`, any method.
    pub fn count(&self, path: &str) -> usize {
        self.state().log.iter().filter(|r| r.path == path).count()
    }

    pub fn total(&self) -> usize {
        self.state().log.len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, RemoteError> {
        let scripted = {
            let mut state = self.state();
            state.log.push(request.clone());
            let key = (request.method.clone(), request.path.clone());
            match state.routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        let Some(scripted) = scripted else {
            return Ok(RawResponse {
                status: 404,
                body: Vec::new(),
            });
        };

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }

        match scripted.reply {
            Reply::Respond(raw) => Ok(raw),
            Reply::Fail(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_are_consumed_then_the_last_repeats() {
        let transport = MemoryTransport::new();
        let request = ApiRequest::get("/actuators/a1/current-percentage-value");
        transport.respond(request.clone(), 200, r#"{"value":1}"#);
        transport.respond(request.clone(), 200, r#"{"value":2}"#);

        let bodies: Vec<String> = futures::future::join_all((0..3).map(|_| transport.send(&request)))
            .await
            .into_iter()
            .map(|r| String::from_utf8(r.unwrap().body).unwrap())
            .collect();

        assert_eq!(bodies, [r#"{"value":1}"#, r#"{"value":2}"#, r#"{"value":2}"#]);
        assert_eq!(transport.count("/actuators/a1/current-percentage-value"), 3);
    }

    #[tokio::test]
    async fn unrouted_request_is_not_found() {
        let transport = MemoryTransport::new();
        let raw = transport.send(&ApiRequest::get("/nowhere")).await.unwrap();
        assert_eq!(raw.status, 404);
        assert!(raw.body.is_empty());
    }

    #[tokio::test]
    async fn query_is_ignored_for_routing() {
        let transport = MemoryTransport::new();
        transport.respond(ApiRequest::put("/actuators/a1/operate-blind-roller"), 200, "");
        let request = ApiRequest::put("/actuators/a1/operate-blind-roller").with_query("percentage", 70);

        let raw = transport.send(&request).await.unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(transport.requests()[0].query, vec![("percentage".to_owned(), "70".to_owned())]);
    }
}
