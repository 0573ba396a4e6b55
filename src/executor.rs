//! Runs [`Command`]s against the backend and reports each as an [`Outcome`].

use serde_json::{json, Value};
use url::Url;

use crate::api::types::{
    ChatRequest, CreateSessionRequest, FileCheckRequest, PolicyCheck, ShellCheckRequest,
    WebhookRequest, WebhookText,
};
use crate::api::{ApiClient, ApiError};
use crate::app::{Command, Outcome};

/// `/webhooks/<source>` with `source` percent-encoded as one path segment.
pub fn webhook_path(source: &str) -> Result<String, ApiError> {
    let mut url = Url::parse("http://backend/webhooks")
        .map_err(|e| ApiError::transport(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::transport("webhook path cannot be built"))?
        .push(source);
    Ok(url.path().to_string())
}

pub async fn execute(client: &ApiClient, command: Command) -> Outcome {
    match command {
        Command::Refresh { view, path, seq } => Outcome::Refreshed {
            view,
            seq,
            result: client.get(&path).await,
        },
        Command::LoadSetup { seq, announce } => Outcome::SetupLoaded {
            seq,
            announce,
            result: client.get("/setup/state").await,
        },
        Command::Chat { session_id, text } => Outcome::ChatReplied(
            client
                .post_as("/chat", &ChatRequest { session_id, text })
                .await,
        ),
        Command::ApplySetup(patch) => {
            Outcome::SetupApplied(client.post_as("/setup/apply", &patch).await)
        }
        Command::TestProvider => {
            Outcome::ProviderTested(client.post_as("/provider/test", &json!({})).await)
        }
        Command::LoadConfig => Outcome::ConfigLoaded(client.get("/config").await),
        Command::SaveConfig(config) => {
            Outcome::ConfigSaved(client.put("/config", &json!({ "config": config })).await)
        }
        Command::CreateSession {
            session_id,
            display_name,
        } => Outcome::SessionCreated(
            client
                .post(
                    "/sessions",
                    &CreateSessionRequest {
                        session_id,
                        display_name,
                    },
                )
                .await,
        ),
        Command::CreateJob(job) => Outcome::JobCreated(client.post("/jobs", &job).await),
        Command::SendWebhook { source, text } => {
            Outcome::WebhookSent(send_webhook(client, &source, text).await)
        }
        Command::CheckPolicy(check) => Outcome::PolicyChecked(check_policy(client, check).await),
        Command::VerifyAudit => Outcome::PolicyChecked(client.get("/audit/verify").await),
        Command::LoadInteractions { path } => {
            Outcome::InteractionsLoaded(client.get_as(&path).await)
        }
    }
}

async fn send_webhook(client: &ApiClient, source: &str, text: String) -> Result<Value, ApiError> {
    let path = webhook_path(source)?;
    let body = WebhookRequest {
        payload: WebhookText { text },
    };
    client.post(&path, &body).await
}

async fn check_policy(client: &ApiClient, check: PolicyCheck) -> Result<Value, ApiError> {
    match check {
        PolicyCheck::File(path) => {
            client
                .post("/policy/file-check", &FileCheckRequest { path })
                .await
        }
        PolicyCheck::Shell(command) => {
            client
                .post("/policy/shell-check", &ShellCheckRequest { command })
                .await
        }
    }
}

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
#[allow(dead_code)]
mod helpers;
