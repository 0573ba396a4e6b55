use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::types::{
    ChatReply, Interactions, JobPayload, JobRequest, PolicyCheck, ProviderTest, SessionEntry,
    SessionList, SetupApplied,
};
use crate::api::{decode, ApiError};
use crate::input::{self, Action};
use crate::settings::{Limits, Settings};
use crate::setup::{SetupForm, SetupPatch, SetupState};
use crate::topology::{reconstruct, TopologyLayout, TopologySnapshot};

const TRANSCRIPT_CAP: usize = 1000;
const PROVIDER_TEST_PREVIEW: usize = 140;

/// A server-backed view that is refreshed by fetch-and-replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Topology,
    Agents,
    Bus,
    Audit,
    Jobs,
    Webhooks,
    Sessions,
    Setup,
}

impl View {
    /// Views refreshed by `/refresh` with no argument, in issue order.
    pub const REFRESHABLE: [View; 7] = [
        View::Topology,
        View::Bus,
        View::Agents,
        View::Sessions,
        View::Jobs,
        View::Webhooks,
        View::Audit,
    ];

    /// Views whose refresh follows a chat reply.
    pub const AFTER_CHAT: [View; 4] = [View::Topology, View::Bus, View::Agents, View::Sessions];

    pub fn name(&self) -> &'static str {
        match self {
            View::Topology => "topology",
            View::Agents => "agents",
            View::Bus => "bus",
            View::Audit => "audit",
            View::Jobs => "jobs",
            View::Webhooks => "webhooks",
            View::Sessions => "sessions",
            View::Setup => "setup",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::REFRESHABLE.iter().copied().find(|v| v.name() == name)
    }

    pub fn path(&self, limits: &Limits) -> String {
        match self {
            View::Topology => "/topology".to_string(),
            View::Agents => "/agents".to_string(),
            View::Bus => format!("/bus/messages?limit={}", limits.bus),
            View::Audit => format!("/audit?limit={}", limits.audit),
            View::Jobs => "/jobs".to_string(),
            View::Webhooks => format!("/webhooks?limit={}", limits.webhooks),
            View::Sessions => "/sessions".to_string(),
            View::Setup => "/setup/state".to_string(),
        }
    }
}

/// Tabs of the lower panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Agents,
    Bus,
    Audit,
    Jobs,
    Webhooks,
    Sessions,
    Setup,
    Config,
}

impl Tab {
    pub const ALL: [Tab; 8] = [
        Tab::Agents,
        Tab::Bus,
        Tab::Audit,
        Tab::Jobs,
        Tab::Webhooks,
        Tab::Sessions,
        Tab::Setup,
        Tab::Config,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Agents => "Agents",
            Tab::Bus => "Bus",
            Tab::Audit => "Policy & Audit",
            Tab::Jobs => "Jobs",
            Tab::Webhooks => "Webhooks",
            Tab::Sessions => "Sessions",
            Tab::Setup => "Setup",
            Tab::Config => "Config",
        }
    }

    /// The JSON panel this tab shows, if it is one.
    pub fn view(&self) -> Option<View> {
        match self {
            Tab::Agents => Some(View::Agents),
            Tab::Bus => Some(View::Bus),
            Tab::Audit => Some(View::Audit),
            Tab::Jobs => Some(View::Jobs),
            Tab::Webhooks => Some(View::Webhooks),
            Tab::Sessions => Some(View::Sessions),
            Tab::Setup | Tab::Config => None,
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    fn next(&self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(&self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
    System,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Bot => "BOT",
            Role::System => "INFO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub role: Role,
    pub text: String,
}

/// Last good JSON of a panel plus the outcome of its latest refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelView {
    pub body: String,
    pub error: Option<String>,
}

/// One network call the client wants made.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh { view: View, path: String, seq: u64 },
    LoadSetup { seq: u64, announce: bool },
    Chat { session_id: String, text: String },
    ApplySetup(SetupPatch),
    TestProvider,
    LoadConfig,
    SaveConfig(Value),
    CreateSession { session_id: String, display_name: Option<String> },
    CreateJob(JobRequest),
    SendWebhook { source: String, text: String },
    CheckPolicy(PolicyCheck),
    VerifyAudit,
    LoadInteractions { path: String },
}

/// The result of executing a [`Command`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Refreshed { view: View, seq: u64, result: Result<Value, ApiError> },
    SetupLoaded { seq: u64, announce: bool, result: Result<Value, ApiError> },
    ChatReplied(Result<ChatReply, ApiError>),
    SetupApplied(Result<SetupApplied, ApiError>),
    ProviderTested(Result<ProviderTest, ApiError>),
    ConfigLoaded(Result<Value, ApiError>),
    ConfigSaved(Result<Value, ApiError>),
    SessionCreated(Result<Value, ApiError>),
    JobCreated(Result<Value, ApiError>),
    WebhookSent(Result<Value, ApiError>),
    PolicyChecked(Result<Value, ApiError>),
    InteractionsLoaded(Result<Interactions, ApiError>),
}

/// Per-view request numbering. A response is applied only if it is newer
/// than the last one applied for the same view.
#[derive(Debug, Default)]
struct Sequencer {
    issued: HashMap<View, u64>,
    applied: HashMap<View, u64>,
}

impl Sequencer {
    fn next(&mut self, view: View) -> u64 {
        let n = self.issued.entry(view).or_insert(0);
        *n += 1;
        *n
    }

    fn accept(&mut self, view: View, seq: u64) -> bool {
        let last = self.applied.entry(view).or_insert(0);
        if seq <= *last {
            return false;
        }
        *last = seq;
        true
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Client state. Mutated only by the event loop, through `handle_key`,
/// `perform` and `apply`.
pub struct App {
    pub should_quit: bool,
    limits: Limits,
    sequencer: Sequencer,
    /// True until the first setup load has been applied.
    booting: bool,

    // Chat.
    pub transcript: Vec<ChatLine>,
    pub session_id: String,
    pub sessions: Vec<SessionEntry>,
    pub input: String,

    // Topology.
    pub topology: Option<TopologyLayout>,
    /// Nodes in the last snapshot, reachable or not.
    pub topology_nodes: usize,
    pub topology_hidden: usize,
    pub topology_error: Option<String>,
    pub topology_scroll: u16,

    // Lower panel.
    pub panels: HashMap<View, PanelView>,
    pub tab: Tab,
    pub panel_scroll: u16,

    // Setup and raw config.
    pub form: SetupForm,
    pub setup_status: String,
    pub setup_raw: String,
    pub config_editor: String,
    pub config_status: String,

    /// One-line feedback in the status bar.
    pub notice: Option<String>,
}

impl App {
    pub fn new(settings: &Settings) -> Self {
        Self {
            should_quit: false,
            limits: settings.limits,
            sequencer: Sequencer::default(),
            booting: false,
            transcript: Vec::new(),
            session_id: settings.session.clone(),
            sessions: Vec::new(),
            input: String::new(),
            topology: None,
            topology_nodes: 0,
            topology_hidden: 0,
            topology_error: None,
            topology_scroll: 0,
            panels: HashMap::new(),
            tab: Tab::Agents,
            panel_scroll: 0,
            form: SetupForm::default(),
            setup_status: String::new(),
            setup_raw: String::new(),
            config_editor: String::new(),
            config_status: String::new(),
            notice: None,
        }
    }

    /// First load: setup state, then every view, then recent interactions.
    pub fn startup(&mut self) -> Vec<Command> {
        self.booting = true;
        vec![self.load_setup(false)]
    }

    /// Periodic refresh.
    pub fn poll(&mut self) -> Vec<Command> {
        vec![self.refresh(View::Topology), self.refresh(View::Agents)]
    }

    pub fn refresh(&mut self, view: View) -> Command {
        if view == View::Setup {
            return self.load_setup(false);
        }
        Command::Refresh {
            view,
            path: view.path(&self.limits),
            seq: self.sequencer.next(view),
        }
    }

    fn refresh_all(&mut self) -> Vec<Command> {
        View::REFRESHABLE.iter().map(|&v| self.refresh(v)).collect()
    }

    fn load_setup(&mut self, announce: bool) -> Command {
        Command::LoadSetup {
            seq: self.sequencer.next(View::Setup),
            announce,
        }
    }

    pub fn panel(&self, view: View) -> Option<&PanelView> {
        self.panels.get(&view)
    }

    fn push_line(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(ChatLine {
            role,
            text: text.into(),
        });
        if self.transcript.len() > TRANSCRIPT_CAP {
            self.transcript.drain(0..TRANSCRIPT_CAP / 2);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Enter => return self.submit(),
            KeyCode::Esc => self.input.clear(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            // Ctrl and Alt chords are not text.
            KeyCode::Char(c) if key.modifiers.difference(KeyModifiers::SHIFT).is_empty() => {
                self.input.push(c)
            }
            KeyCode::Tab => self.switch_tab(self.tab.next()),
            KeyCode::BackTab => self.switch_tab(self.tab.prev()),
            KeyCode::Up => self.topology_scroll = self.topology_scroll.saturating_sub(1),
            KeyCode::Down => self.topology_scroll = self.topology_scroll.saturating_add(1),
            KeyCode::PageUp => self.panel_scroll = self.panel_scroll.saturating_sub(10),
            KeyCode::PageDown => self.panel_scroll = self.panel_scroll.saturating_add(10),
            _ => {}
        }
        Vec::new()
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.panel_scroll = 0;
    }

    /// Submit the input line.
    pub fn submit(&mut self) -> Vec<Command> {
        match input::parse(&self.input) {
            Ok(None) => Vec::new(),
            Ok(Some(action)) => {
                self.input.clear();
                self.notice = None;
                self.perform(action)
            }
            Err(err) => {
                self.notice = Some(err.to_string());
                Vec::new()
            }
        }
    }

    pub fn perform(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Chat(text) => self.send_chat(text),
            Action::Help => {
                for line in input::HELP {
                    self.push_line(Role::System, *line);
                }
                Vec::new()
            }
            Action::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Action::Refresh(Some(view)) => vec![self.refresh(view)],
            Action::Refresh(None) => self.refresh_all(),
            Action::SelectSession(id) => {
                self.notice = Some(format!("session: {id}"));
                self.session_id = id;
                Vec::new()
            }
            Action::CreateSession {
                session_id,
                display_name,
            } => vec![Command::CreateSession {
                session_id,
                display_name,
            }],
            Action::SetupLoad => vec![self.load_setup(true)],
            Action::SetupApply => self.apply_setup(),
            Action::SetupTest => {
                self.setup_status = "Testing provider...".to_string();
                vec![Command::TestProvider]
            }
            Action::SetField { field, value } => {
                if let Err(err) = self.form.set(field, &value) {
                    self.notice = Some(err.to_string());
                }
                self.tab = Tab::Setup;
                Vec::new()
            }
            Action::ConfigLoad => vec![Command::LoadConfig],
            Action::ConfigEdit(text) => {
                self.config_editor = text;
                self.tab = Tab::Config;
                Vec::new()
            }
            Action::ConfigSave => match serde_json::from_str::<Value>(&self.config_editor) {
                Ok(config) => vec![Command::SaveConfig(config)],
                Err(_) => {
                    self.config_status = "Invalid JSON".to_string();
                    Vec::new()
                }
            },
            Action::PolicyFile(path) => vec![Command::CheckPolicy(PolicyCheck::File(path))],
            Action::PolicyShell(command) => {
                vec![Command::CheckPolicy(PolicyCheck::Shell(command))]
            }
            Action::AuditVerify => vec![Command::VerifyAudit],
            Action::CreateJob {
                name,
                cron,
                kind,
                text,
            } => {
                let payload = JobPayload::new(&kind, &self.session_id, &text);
                vec![Command::CreateJob(JobRequest {
                    name,
                    cron,
                    enabled: true,
                    payload,
                })]
            }
            Action::Webhook { source, text } => vec![Command::SendWebhook { source, text }],
        }
    }

    /// Optimistically append the message, then ask for the reply.
    fn send_chat(&mut self, text: String) -> Vec<Command> {
        let session_id = self.session_id.clone();
        self.push_line(Role::User, format!("[{session_id}] {text}"));
        self.input.clear();
        vec![Command::Chat { session_id, text }]
    }

    fn apply_setup(&mut self) -> Vec<Command> {
        match self.form.to_patch() {
            Ok(patch) => {
                self.setup_status = "Applying setup...".to_string();
                vec![Command::ApplySetup(patch)]
            }
            Err(err) => {
                self.setup_status = format!("Error: {err}");
                Vec::new()
            }
        }
    }

    /// Apply a finished request and return any follow-up requests.
    pub fn apply(&mut self, outcome: Outcome) -> Vec<Command> {
        match outcome {
            Outcome::Refreshed { view, seq, result } => {
                if !self.sequencer.accept(view, seq) {
                    debug!(view = view.name(), seq, "discarding stale response");
                    return Vec::new();
                }
                self.apply_refresh(view, result);
                Vec::new()
            }
            Outcome::SetupLoaded {
                seq,
                announce,
                result,
            } => self.apply_setup_state(seq, announce, result),
            Outcome::ChatReplied(Ok(reply)) => {
                let text = reply
                    .reply
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "(empty)".to_string());
                self.push_line(Role::Bot, text);
                View::AFTER_CHAT.iter().map(|&v| self.refresh(v)).collect()
            }
            Outcome::ChatReplied(Err(err)) => {
                self.push_line(Role::Bot, format!("Error: {err}"));
                Vec::new()
            }
            Outcome::SetupApplied(Ok(out)) => {
                self.form.scrub_secrets();
                let provider = out.provider_active.unwrap_or_default();
                info!(provider = %provider, "setup applied");
                self.setup_status = format!("Setup saved. Provider: {provider}");
                vec![self.load_setup(false)]
            }
            Outcome::SetupApplied(Err(err)) => {
                self.setup_status = format!("Error: {err}");
                Vec::new()
            }
            Outcome::ProviderTested(Ok(test)) => {
                let preview: String = test.result.chars().take(PROVIDER_TEST_PREVIEW).collect();
                self.setup_status = format!("Provider test: {preview}");
                Vec::new()
            }
            Outcome::ProviderTested(Err(err)) => {
                self.setup_status = format!("Provider test error: {err}");
                Vec::new()
            }
            Outcome::ConfigLoaded(Ok(config)) => {
                self.config_editor = pretty(&config);
                self.config_status = "Config loaded".to_string();
                Vec::new()
            }
            Outcome::ConfigSaved(Ok(_)) => {
                info!("config saved");
                self.config_status = "Config saved".to_string();
                vec![self.load_setup(false)]
            }
            Outcome::ConfigLoaded(Err(err)) | Outcome::ConfigSaved(Err(err)) => {
                self.config_status = format!("Error: {err}");
                Vec::new()
            }
            Outcome::SessionCreated(Ok(_)) => vec![self.refresh(View::Sessions)],
            Outcome::JobCreated(Ok(_)) => vec![self.refresh(View::Jobs)],
            Outcome::WebhookSent(Ok(_)) => vec![self.refresh(View::Webhooks)],
            Outcome::SessionCreated(Err(err))
            | Outcome::JobCreated(Err(err))
            | Outcome::WebhookSent(Err(err)) => {
                self.notice = Some(format!("Error: {err}"));
                Vec::new()
            }
            Outcome::PolicyChecked(result) => {
                let panel = self.panels.entry(View::Audit).or_default();
                match result {
                    Ok(value) => {
                        panel.body = pretty(&value);
                        panel.error = None;
                    }
                    Err(err) => panel.error = Some(err.to_string()),
                }
                self.tab = Tab::Audit;
                Vec::new()
            }
            Outcome::InteractionsLoaded(Ok(interactions)) => {
                for event in interactions.events.into_iter().rev() {
                    self.push_line(Role::User, event.user_text);
                    if let Some(bot) = event.bot_text.filter(|b| !b.is_empty()) {
                        self.push_line(Role::Bot, bot);
                    }
                }
                Vec::new()
            }
            Outcome::InteractionsLoaded(Err(err)) => {
                self.push_line(Role::Bot, format!("Init error: {err}"));
                Vec::new()
            }
        }
    }

    fn apply_refresh(&mut self, view: View, result: Result<Value, ApiError>) {
        if view == View::Topology {
            match result.and_then(decode::<TopologySnapshot>) {
                Ok(snapshot) => {
                    let layout = reconstruct(&snapshot);
                    self.topology_nodes = snapshot.nodes.len();
                    self.topology_hidden = layout.hidden_count(&snapshot);
                    self.topology = Some(layout);
                    self.topology_error = None;
                }
                Err(err) => self.topology_error = Some(err.to_string()),
            }
            return;
        }

        match result {
            Ok(value) => {
                if view == View::Sessions {
                    let list: SessionList = serde_json::from_value(value.clone()).unwrap_or_default();
                    self.set_sessions(list.sessions);
                }
                let panel = self.panels.entry(view).or_default();
                panel.body = pretty(&value);
                panel.error = None;
            }
            Err(err) => {
                self.panels.entry(view).or_default().error = Some(err.to_string());
            }
        }
    }

    /// Keep the selected session if the server still lists it.
    fn set_sessions(&mut self, sessions: Vec<SessionEntry>) {
        if sessions.is_empty() {
            self.session_id = crate::settings::DEFAULT_SESSION.to_string();
        } else if !sessions.iter().any(|s| s.session_id == self.session_id) {
            self.session_id = sessions[0].session_id.clone();
        }
        self.sessions = sessions;
    }

    fn apply_setup_state(
        &mut self,
        seq: u64,
        announce: bool,
        result: Result<Value, ApiError>,
    ) -> Vec<Command> {
        let booting = std::mem::take(&mut self.booting);
        if !self.sequencer.accept(View::Setup, seq) {
            debug!(seq, "discarding stale setup state");
            return Vec::new();
        }

        match result {
            Ok(value) => {
                self.form.hydrate(&SetupState::from_value(&value));
                self.setup_raw = pretty(&value);
                let config = value.get("config").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                self.config_editor = pretty(&config);
                if announce {
                    self.setup_status = "Setup loaded.".to_string();
                }
                if booting {
                    let mut commands = self.refresh_all();
                    commands.push(Command::LoadInteractions {
                        path: format!("/interactions?limit={}", self.limits.interactions),
                    });
                    return commands;
                }
            }
            Err(err) if booting => self.push_line(Role::Bot, format!("Init error: {err}")),
            Err(err) => self.setup_status = format!("Error: {err}"),
        }
        Vec::new()
    }
}

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
#[allow(dead_code)]
mod helpers;
