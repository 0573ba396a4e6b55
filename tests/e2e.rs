//! End-to-end tests for the dashboard pipeline.
//!
//! Each test runs a small in-process backend and exercises the full path:
//! input line → App → executor → HTTP → backend → Outcome → App state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use fleetview::api::ApiClient;
use fleetview::app::{App, Command, Tab, View};
use fleetview::executor::execute;
use fleetview::settings::Settings;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Backend {
    /// Every request as "METHOD /path".
    hits: Vec<String>,
    /// Config as the backend stores it. Never holds a secret value.
    config: Value,
    persona: Value,
    /// Bodies received by /setup/apply.
    applied: Vec<Value>,
    webhooks: Vec<(String, Value)>,
}

type Shared = Arc<Mutex<Backend>>;

fn hit(state: &Shared, method: &str, uri: &Uri) {
    state.lock().unwrap().hits.push(format!("{method} {}", uri.path()));
}

async fn setup_state(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    hit(&state, "GET", &uri);
    let s = state.lock().unwrap();
    Json(json!({"config": s.config, "persona": s.persona}))
}

/// Stores the patch the way a real backend would: the model is normalized
/// and the key value is consumed, not echoed back into config.
async fn setup_apply(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    hit(&state, "POST", &uri);
    let mut s = state.lock().unwrap();
    let active = body["provider_active"].as_str().unwrap_or("github_models").to_string();
    let model = body["provider_model"].as_str().unwrap_or("").to_lowercase();
    let mut options = serde_json::Map::new();
    options.insert(active.clone(), json!({"model": model}));
    s.config = json!({
        "provider": {"active": active, "options": options},
        "agents": {"max_active": body["max_active_agents"]},
        "bus": {"backend": body["bus_backend"]},
    });
    s.persona = json!({"name": body["bot_name"], "tone": body["bot_tone"]});
    s.applied.push(body);
    Json(json!({"provider_active": active}))
}

async fn chat(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    hit(&state, "POST", &uri);
    let text = body["text"].as_str().unwrap_or_default();
    if text == "fail" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "provider down"})),
        );
    }
    (StatusCode::OK, Json(json!({"reply": format!("echo: {text}")})))
}

async fn topology(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    hit(&state, "GET", &uri);
    Json(json!({
        "nodes": [
            {"agent_id": "lead", "parent_id": null, "role": "planner", "status": "running"},
            {"agent_id": "w1", "parent_id": "lead", "role": "coder", "status": "idle", "task_id": "t1"},
            {"agent_id": "lost", "parent_id": "gone", "role": "coder", "status": "idle"}
        ],
        "edges": [{"from": "lead", "to": "w1", "task_id": "t1"}]
    }))
}

async fn agents_down(State(state): State<Shared>, uri: Uri) -> StatusCode {
    hit(&state, "GET", &uri);
    StatusCode::SERVICE_UNAVAILABLE
}

async fn empty_list(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    hit(&state, "GET", &uri);
    Json(json!([]))
}

async fn sessions(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    hit(&state, "GET", &uri);
    Json(json!({"sessions": [{"session_id": "default", "display_name": "Default"}]}))
}

async fn interactions(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    hit(&state, "GET", &uri);
    Json(json!({"events": [
        {"user_text": "newest", "bot_text": null},
        {"user_text": "oldest", "bot_text": "ack"}
    ]}))
}

async fn get_config(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    hit(&state, "GET", &uri);
    Json(state.lock().unwrap().config.clone())
}

async fn put_config(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    hit(&state, "PUT", &uri);
    state.lock().unwrap().config = body["config"].clone();
    Json(json!({"ok": true}))
}

async fn webhook(
    State(state): State<Shared>,
    uri: Uri,
    Path(source): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    hit(&state, "POST", &uri);
    state.lock().unwrap().webhooks.push((source, body));
    Json(json!({"accepted": true}))
}

async fn start_backend() -> (ApiClient, Shared) {
    let state: Shared = Arc::new(Mutex::new(Backend {
        config: json!({}),
        persona: json!({}),
        ..Default::default()
    }));
    let router = Router::new()
        .route("/setup/state", get(setup_state))
        .route("/setup/apply", post(setup_apply))
        .route("/chat", post(chat))
        .route("/topology", get(topology))
        .route("/agents", get(agents_down))
        .route("/bus/messages", get(empty_list))
        .route("/jobs", get(empty_list))
        .route("/webhooks", get(empty_list))
        .route("/audit", get(empty_list))
        .route("/sessions", get(sessions))
        .route("/interactions", get(interactions))
        .route("/config", get(get_config).put(put_config))
        .route("/webhooks/:source", post(webhook))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = ApiClient::http(&format!("http://{addr}/")).unwrap();
    (client, state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn drive(app: &mut App, client: &ApiClient, commands: Vec<Command>) {
    let mut queue: VecDeque<Command> = commands.into();
    while let Some(command) = queue.pop_front() {
        let outcome = execute(client, command).await;
        queue.extend(app.apply(outcome));
    }
}

async fn type_line(app: &mut App, client: &ApiClient, line: &str) {
    app.input = line.to_string();
    let commands = app.submit();
    drive(app, client, commands).await;
}

fn transcript(app: &App) -> Vec<String> {
    app.transcript
        .iter()
        .map(|l| format!("{}: {}", l.role.label(), l.text))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn startup_hydrates_every_view() {
    let (client, backend) = start_backend().await;
    let mut app = App::new(&Settings::default());
    let commands = app.startup();
    drive(&mut app, &client, commands).await;

    // Setup defaults fill an empty config.
    assert_eq!(app.form.provider_active, "github_models");
    assert_eq!(app.form.provider_key_env, "GITHUB_TOKEN");
    assert_eq!(app.form.tailscale_cidrs, "100.64.0.0/10");
    assert_eq!(app.form.max_agents, "4");

    let layout = app.topology.as_ref().unwrap();
    assert_eq!(layout.levels.len(), 2);
    assert_eq!(app.topology_hidden, 1);

    // A failing view reports its own error and does not block the others.
    assert_eq!(
        app.panel(View::Agents).unwrap().error.as_deref(),
        Some("Service Unavailable")
    );
    assert!(app.panel(View::Jobs).unwrap().error.is_none());

    assert_eq!(transcript(&app), vec!["USER: oldest", "BOT: ack", "USER: newest"]);

    let hits = backend.lock().unwrap().hits.clone();
    assert_eq!(hits.first().map(String::as_str), Some("GET /setup/state"));
    assert_eq!(hits.last().map(String::as_str), Some("GET /interactions"));
}

#[tokio::test]
async fn applied_secret_is_sent_once_then_forgotten() {
    let (client, backend) = start_backend().await;
    let mut app = App::new(&Settings::default());
    let commands = app.startup();
    drive(&mut app, &client, commands).await;

    type_line(&mut app, &client, "/set provider_active openai").await;
    type_line(&mut app, &client, "/set provider_model GPT-Large").await;
    type_line(&mut app, &client, "/set provider_api_key_value sk-live-42").await;
    type_line(&mut app, &client, "/set bot_name Ada").await;
    assert_eq!(app.tab, Tab::Setup);

    type_line(&mut app, &client, "/setup apply").await;

    let s = backend.lock().unwrap();
    assert_eq!(s.applied.len(), 1);
    assert_eq!(s.applied[0]["provider_api_key_value"], json!("sk-live-42"));
    assert_eq!(s.applied[0]["copilot_token"], Value::Null);
    assert_eq!(s.applied[0]["max_active_agents"], json!(4));
    let last_two: Vec<&str> = s.hits.iter().rev().take(2).map(String::as_str).collect();
    assert_eq!(last_two, vec!["GET /setup/state", "POST /setup/apply"]);
    drop(s);

    assert_eq!(app.setup_status, "Setup saved. Provider: openai");
    assert_eq!(app.form.provider_key_value, "");
    assert!(!app.form.has_secrets());
    // The reread shows the backend's normalized value, not what was typed.
    assert_eq!(app.form.provider_model, "gpt-large");
    assert_eq!(app.form.bot_name, "Ada");
    assert!(!app.setup_raw.contains("sk-live-42"));
    assert!(!format!("{:?}", app.form).contains("sk-live-42"));
}

#[tokio::test]
async fn chat_error_is_surfaced_without_refreshes() {
    let (client, backend) = start_backend().await;
    let mut app = App::new(&Settings::default());

    type_line(&mut app, &client, "fail").await;
    assert_eq!(
        transcript(&app),
        vec!["USER: [default] fail", "BOT: Error: provider down"]
    );
    assert_eq!(backend.lock().unwrap().hits, vec!["POST /chat"]);

    type_line(&mut app, &client, "hello").await;
    assert_eq!(transcript(&app)[3], "BOT: echo: hello");
    let hits = backend.lock().unwrap().hits.clone();
    for path in ["GET /topology", "GET /bus/messages", "GET /agents", "GET /sessions"] {
        assert!(hits.iter().any(|h| h == path), "missing refresh {path}");
    }
}

#[tokio::test]
async fn unreachable_backend_reports_transport_error() {
    let client = ApiClient::http("http://127.0.0.1:9").unwrap();
    let mut app = App::new(&Settings::default());
    let commands = app.startup();
    drive(&mut app, &client, commands).await;

    let lines = transcript(&app);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("BOT: Init error: "));
}

#[tokio::test]
async fn webhook_source_round_trips_through_path() {
    let (client, backend) = start_backend().await;
    let mut app = App::new(&Settings::default());

    type_line(&mut app, &client, "/webhook ci/main build broke").await;

    let s = backend.lock().unwrap();
    assert_eq!(s.webhooks.len(), 1);
    assert_eq!(s.webhooks[0].0, "ci/main");
    assert_eq!(s.webhooks[0].1, json!({"payload": {"text": "build broke"}}));
    assert_eq!(s.hits.last().map(String::as_str), Some("GET /webhooks"));
}

#[tokio::test]
async fn config_save_then_load() {
    let (client, backend) = start_backend().await;
    let mut app = App::new(&Settings::default());

    type_line(&mut app, &client, r#"/config edit {"bus": {"backend": "redis"}}"#).await;
    type_line(&mut app, &client, "/config save").await;
    assert_eq!(app.config_status, "Config saved");
    assert_eq!(backend.lock().unwrap().config, json!({"bus": {"backend": "redis"}}));
    // Saving rereads setup state.
    assert_eq!(app.form.bus_backend, "redis");

    app.config_editor.clear();
    type_line(&mut app, &client, "/config load").await;
    assert!(app.config_editor.contains("\"redis\""));

    type_line(&mut app, &client, "/config edit {oops").await;
    type_line(&mut app, &client, "/config save").await;
    assert_eq!(app.config_status, "Invalid JSON");
    assert_eq!(backend.lock().unwrap().config, json!({"bus": {"backend": "redis"}}));
}
