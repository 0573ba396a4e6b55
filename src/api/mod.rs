//! Access layer: every network call the dashboard makes goes through
//! [`ApiClient::request`], which turns transport failures, non-2xx statuses
//! and unparsable bodies into a single [`ApiError`].

pub mod http;
pub mod types;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub use http::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response as it came off the wire, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Reason phrase for the status, e.g. "Service Unavailable".
    pub reason: Option<String>,
    pub body: String,
}

/// The one error every caller of the access layer sees.
///
/// `message` is what the operator is shown; `status` is kept for logging and
/// is `None` when the request never got a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Build the error for a non-2xx response.
    /// Message priority: `detail`, then `raw`, then the status phrase.
    pub fn from_response(response: &RawResponse, body: &Value) -> Self {
        let message = detail_message(body)
            .or_else(|| raw_message(body))
            .unwrap_or_else(|| status_phrase(response));
        Self {
            message,
            status: Some(response.status),
        }
    }

    fn unexpected(err: serde_json::Error) -> Self {
        Self::transport(format!("unexpected response: {err}"))
    }
}

fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn raw_message(body: &Value) -> Option<String> {
    match body.get("raw")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn status_phrase(response: &RawResponse) -> String {
    match response.reason.as_deref() {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => response.status.to_string(),
    }
}

/// Parse a response body, wrapping anything that is not JSON as `{"raw": text}`.
pub fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Deserialize a success body into one of the response records.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(ApiError::unexpected)
}

/// The wire underneath the client. Implementations perform exactly one
/// attempt per call; no retries, no timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<RawResponse, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Client talking JSON over HTTP to `base_url`.
    pub fn http(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url)?)))
    }

    pub async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let payload = body.map(Value::to_string);
        let response = match self.transport.send(method, path, payload).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, path, error = %err, "request failed before a response");
                return Err(err);
            }
        };

        let json = parse_body(&response.body);
        if !(200..300).contains(&response.status) {
            let err = ApiError::from_response(&response, &json);
            warn!(%method, path, status = response.status, error = %err, "request rejected");
            return Err(err);
        }

        debug!(%method, path, status = response.status, "request ok");
        Ok(json)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(path, Method::Get, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::transport(e.to_string()))?;
        self.request(path, Method::Post, Some(&body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::transport(e.to_string()))?;
        self.request(path, Method::Put, Some(&body)).await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(self.get(path).await?)
    }

    pub async fn post_as<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        decode(self.post(path, body).await?)
    }
}

#[cfg(test)]
#[path = "../../tests/helpers/mod.rs"]
#[allow(dead_code)]
mod helpers;

#[cfg(test)]
mod tests {
    use super::helpers::*;
    use super::*;

    fn client_with(transport: ScriptedTransport) -> (ApiClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (ApiClient::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn error_uses_detail_field() {
        let (client, _) = client_with(
            ScriptedTransport::new().route(Method::Get, "/x", respond(400, r#"{"detail":"bad path"}"#)),
        );
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message, "bad path");
        assert_eq!(err.status, Some(400));
    }

    #[tokio::test]
    async fn error_uses_raw_text_for_non_json_body() {
        let (client, _) =
            client_with(ScriptedTransport::new().route(Method::Get, "/x", respond(500, "oops")));
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.to_string(), "oops");
    }

    #[tokio::test]
    async fn error_falls_back_to_status_phrase_for_empty_body() {
        let (client, _) =
            client_with(ScriptedTransport::new().route(Method::Get, "/x", respond(503, "")));
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message, "Service Unavailable");
    }

    #[tokio::test]
    async fn error_without_reason_phrase_uses_status_code() {
        let response = RawResponse {
            status: 599,
            reason: None,
            body: "{}".into(),
        };
        let (client, _) = client_with(ScriptedTransport::new().route(Method::Get, "/x", response));
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message, "599");
    }

    #[tokio::test]
    async fn structured_detail_is_rendered_as_json() {
        let (client, _) = client_with(ScriptedTransport::new().route(
            Method::Post,
            "/x",
            respond(422, r#"{"detail":[{"loc":["body"],"msg":"field required"}]}"#),
        ));
        let err = client.post("/x", &json!({})).await.unwrap_err();
        assert!(err.message.contains("field required"));
    }

    #[tokio::test]
    async fn empty_detail_falls_through_to_status() {
        let (client, _) =
            client_with(ScriptedTransport::new().route(Method::Get, "/x", respond(404, r#"{"detail":""}"#)));
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message, "Not Found");
    }

    #[tokio::test]
    async fn zero_detail_falls_through_to_raw() {
        let (client, _) = client_with(
            ScriptedTransport::new().route(Method::Get, "/x", respond(500, r#"{"detail":0,"raw":"x"}"#)),
        );
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message, "x");
    }

    #[tokio::test]
    async fn nonzero_detail_is_used_verbatim() {
        let (client, _) =
            client_with(ScriptedTransport::new().route(Method::Get, "/x", respond(409, r#"{"detail":7}"#)));
        let err = client.get("/x").await.unwrap_err();
        assert_eq!(err.message, "7");
    }

    #[tokio::test]
    async fn success_with_non_json_body_is_wrapped() {
        let (client, _) =
            client_with(ScriptedTransport::new().route(Method::Get, "/x", respond(200, "plain text")));
        let value = client.get("/x").await.unwrap();
        assert_eq!(value, json!({ "raw": "plain text" }));
    }

    #[tokio::test]
    async fn transport_failure_keeps_its_message() {
        let (client, transport) = client_with(ScriptedTransport::new());
        let err = client.get("/nowhere").await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.message.contains("/nowhere"));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn post_sends_json_body_once() {
        let (client, transport) =
            client_with(ScriptedTransport::new().route(Method::Post, "/chat", respond(200, r#"{"reply":"hi"}"#)));
        let reply: types::ChatReply = client
            .post_as(
                "/chat",
                &types::ChatRequest {
                    session_id: "default".into(),
                    text: "hello".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.reply.as_deref(), Some("hi"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, Some(json!({"session_id": "default", "text": "hello"})));
    }

    #[tokio::test]
    async fn shape_mismatch_is_an_api_error() {
        let (client, _) = client_with(
            ScriptedTransport::new().route(Method::Get, "/interactions", respond(200, r#"{"events":"nope"}"#)),
        );
        let err = client.get_as::<types::Interactions>("/interactions").await.unwrap_err();
        assert!(err.message.starts_with("unexpected response"));
    }
}
