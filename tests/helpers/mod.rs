use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiClient, ApiError, Method, RawResponse, Transport};
use crate::app::{App, Command};
use crate::executor::execute;

/// A response with the canonical reason phrase for `status`.
pub fn respond(status: u16, body: &str) -> RawResponse {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string);
    RawResponse {
        status,
        reason,
        body: body.to_string(),
    }
}

/// One request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// In-memory backend. Each route serves its queued responses in order and
/// keeps repeating the last one.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<RawResponse>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, method: Method, path: &str, response: RawResponse) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<RawResponse, ApiError> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body: body.map(|b| serde_json::from_str(&b).unwrap()),
        });

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&(method, path.to_string()))
            .ok_or_else(|| ApiError::transport(format!("no route for {method} {path}")))?;
        let response = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        Ok(response)
    }
}

/// Execute `commands` one at a time, applying each outcome and queueing
/// its follow-ups, until nothing is left.
pub async fn drive(app: &mut App, client: &ApiClient, commands: Vec<Command>) {
    let mut queue: VecDeque<Command> = commands.into();
    while let Some(command) = queue.pop_front() {
        let outcome = execute(client, command).await;
        queue.extend(app.apply(outcome));
    }
}
