//! Runtime configuration as the backend reports it, and the operator's form.
//!
//! [`SetupState`] is read leniently: a missing section, a missing field or a
//! field of the wrong JSON type all read as "not set", and
//! [`SetupForm::hydrate`] turns "not set" into the documented default. The
//! two secret fields live only in the form and the outbound [`SetupPatch`];
//! nothing read from the server ever fills them.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_PROVIDER: &str = "github_models";
pub const DEFAULT_KEY_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_CIDR: &str = "100.64.0.0/10";
pub const DEFAULT_MAX_AGENTS: i64 = 4;
pub const DEFAULT_PIPELINE_MODE: &str = "sequential";
pub const DEFAULT_PIPELINE_RETRIES: i64 = 1;
pub const DEFAULT_BUS_BACKEND: &str = "local";
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

/// Accept any JSON for a field; anything that does not fit reads as default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Persona {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderOption {
    #[serde(deserialize_with = "lenient")]
    pub base_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    #[serde(deserialize_with = "lenient")]
    pub active: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub options: BTreeMap<String, ProviderOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    #[serde(deserialize_with = "lenient")]
    pub sandbox_mode: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub tailnet_only: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub tailscale_cidrs: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub tailscale_node_allowlist: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub allowed_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    #[serde(deserialize_with = "lenient")]
    pub max_active: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelinesSection {
    #[serde(deserialize_with = "lenient")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_retries: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusSection {
    #[serde(deserialize_with = "lenient")]
    pub backend: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub redis_url: Option<String>,
}

/// The `config` object of `/setup/state`. Secrets have no field here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigState {
    #[serde(deserialize_with = "lenient")]
    pub provider: ProviderSection,
    #[serde(deserialize_with = "lenient")]
    pub security: SecuritySection,
    #[serde(deserialize_with = "lenient")]
    pub agents: AgentsSection,
    #[serde(deserialize_with = "lenient")]
    pub pipelines: PipelinesSection,
    #[serde(deserialize_with = "lenient")]
    pub bus: BusSection,
}

/// Response of `/setup/state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SetupState {
    #[serde(deserialize_with = "lenient")]
    pub config: ConfigState,
    #[serde(deserialize_with = "lenient")]
    pub persona: Persona,
}

impl SetupState {
    /// Never fails: a body that is not even an object reads as empty state.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{field} must be a whole number, got {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("{field} must be true or false, got {value:?}")]
    NotABool { field: &'static str, value: String },
    #[error("unknown setup field: {0}")]
    UnknownField(String),
}

/// Every editable field of the setup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    BotName,
    BotTone,
    ProviderActive,
    ProviderBaseUrl,
    ProviderModel,
    ProviderKeyEnv,
    ProviderKeyValue,
    SandboxMode,
    TailnetOnly,
    TailscaleCidrs,
    NodeAllowlist,
    AllowedPaths,
    MaxAgents,
    PipelineMode,
    PipelineRetries,
    BusBackend,
    BusRedisUrl,
    UseCopilot,
    CopilotToken,
}

impl FormField {
    pub const ALL: [FormField; 19] = [
        FormField::BotName,
        FormField::BotTone,
        FormField::ProviderActive,
        FormField::ProviderBaseUrl,
        FormField::ProviderModel,
        FormField::ProviderKeyEnv,
        FormField::ProviderKeyValue,
        FormField::SandboxMode,
        FormField::TailnetOnly,
        FormField::TailscaleCidrs,
        FormField::NodeAllowlist,
        FormField::AllowedPaths,
        FormField::MaxAgents,
        FormField::PipelineMode,
        FormField::PipelineRetries,
        FormField::BusBackend,
        FormField::BusRedisUrl,
        FormField::UseCopilot,
        FormField::CopilotToken,
    ];

    /// Name used by `/set`.
    pub fn name(&self) -> &'static str {
        match self {
            FormField::BotName => "bot_name",
            FormField::BotTone => "bot_tone",
            FormField::ProviderActive => "provider_active",
            FormField::ProviderBaseUrl => "provider_base_url",
            FormField::ProviderModel => "provider_model",
            FormField::ProviderKeyEnv => "provider_api_key_env",
            FormField::ProviderKeyValue => "provider_api_key_value",
            FormField::SandboxMode => "sandbox_mode",
            FormField::TailnetOnly => "tailnet_only",
            FormField::TailscaleCidrs => "tailscale_cidrs",
            FormField::NodeAllowlist => "node_allowlist",
            FormField::AllowedPaths => "allowed_paths",
            FormField::MaxAgents => "max_agents",
            FormField::PipelineMode => "pipeline_mode",
            FormField::PipelineRetries => "pipeline_retries",
            FormField::BusBackend => "bus_backend",
            FormField::BusRedisUrl => "bus_redis_url",
            FormField::UseCopilot => "use_copilot",
            FormField::CopilotToken => "copilot_token",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, FormError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, FormField::ProviderKeyValue | FormField::CopilotToken)
    }

    pub fn is_toggle(&self) -> bool {
        matches!(
            self,
            FormField::SandboxMode | FormField::TailnetOnly | FormField::UseCopilot
        )
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operator-editable form. Text fields hold exactly what the operator
/// typed; list fields are comma separated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SetupForm {
    pub bot_name: String,
    pub bot_tone: String,
    pub provider_active: String,
    pub provider_base_url: String,
    pub provider_model: String,
    pub provider_key_env: String,
    pub provider_key_value: String,
    pub sandbox_mode: bool,
    pub tailnet_only: bool,
    pub tailscale_cidrs: String,
    pub node_allowlist: String,
    pub allowed_paths: String,
    pub max_agents: String,
    pub pipeline_mode: String,
    pub pipeline_retries: String,
    pub bus_backend: String,
    pub bus_redis_url: String,
    pub use_copilot: bool,
    pub copilot_token: String,
}

impl fmt::Debug for SetupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupForm")
            .field("bot_name", &self.bot_name)
            .field("provider_active", &self.provider_active)
            .field("provider_key_value", &redacted(&self.provider_key_value))
            .field("copilot_token", &redacted(&self.copilot_token))
            .finish_non_exhaustive()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

/// Empty strings count as absent for text fields.
fn text_or(value: &Option<String>, default: &str) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

fn list_or(value: &Option<Vec<String>>, default: &[&str]) -> String {
    match value {
        Some(items) => items.join(", "),
        None => default.join(", "),
    }
}

/// Split a comma separated field, trimming entries and dropping empty ones.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn number_or(field: FormField, value: &str, default: i64) -> Result<i64, FormError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed.parse().map_err(|_| FormError::NotANumber {
        field: field.name(),
        value: value.to_string(),
    })
}

fn parse_toggle(field: FormField, value: &str) -> Result<bool, FormError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(FormError::NotABool {
            field: field.name(),
            value: value.to_string(),
        }),
    }
}

impl SetupForm {
    /// Fill every non-secret field from server state, defaulting what is absent.
    pub fn hydrate(&mut self, state: &SetupState) {
        let cfg = &state.config;
        let active = text_or(&cfg.provider.active, DEFAULT_PROVIDER);
        let option = cfg.provider.options.get(&active).cloned().unwrap_or_default();

        self.bot_name = text_or(&state.persona.name, "");
        self.bot_tone = text_or(&state.persona.tone, "");
        self.provider_base_url = text_or(&option.base_url, "");
        self.provider_model = text_or(&option.model, "");
        self.provider_key_env = text_or(&option.api_key_env, DEFAULT_KEY_ENV);
        self.provider_active = active;
        self.sandbox_mode = cfg.security.sandbox_mode.unwrap_or(false);
        self.tailnet_only = cfg.security.tailnet_only.unwrap_or(false);
        self.tailscale_cidrs = list_or(&cfg.security.tailscale_cidrs, &[DEFAULT_CIDR]);
        self.node_allowlist = list_or(&cfg.security.tailscale_node_allowlist, &[]);
        self.allowed_paths = list_or(&cfg.security.allowed_paths, &[]);
        self.max_agents = cfg
            .agents
            .max_active
            .unwrap_or(DEFAULT_MAX_AGENTS)
            .to_string();
        self.pipeline_mode = text_or(&cfg.pipelines.mode, DEFAULT_PIPELINE_MODE);
        self.pipeline_retries = cfg
            .pipelines
            .max_retries
            .unwrap_or(DEFAULT_PIPELINE_RETRIES)
            .to_string();
        self.bus_backend = text_or(&cfg.bus.backend, DEFAULT_BUS_BACKEND);
        self.bus_redis_url = text_or(&cfg.bus.redis_url, DEFAULT_REDIS_URL);
    }

    /// Build the flat `/setup/apply` body from the current field values.
    pub fn to_patch(&self) -> Result<SetupPatch, FormError> {
        Ok(SetupPatch {
            bot_name: optional_text(&self.bot_name),
            bot_tone: optional_text(&self.bot_tone),
            provider_active: self.provider_active.trim().to_string(),
            provider_base_url: optional_text(&self.provider_base_url),
            provider_model: optional_text(&self.provider_model),
            provider_api_key_env: optional_text(&self.provider_key_env),
            provider_api_key_value: optional_text(&self.provider_key_value),
            sandbox_mode: self.sandbox_mode,
            tailnet_only: self.tailnet_only,
            tailscale_cidrs: split_csv(&self.tailscale_cidrs),
            tailscale_node_allowlist: split_csv(&self.node_allowlist),
            allowed_paths: split_csv(&self.allowed_paths),
            max_active_agents: number_or(FormField::MaxAgents, &self.max_agents, DEFAULT_MAX_AGENTS)?,
            pipeline_mode: self.pipeline_mode.trim().to_string(),
            pipeline_max_retries: number_or(
                FormField::PipelineRetries,
                &self.pipeline_retries,
                DEFAULT_PIPELINE_RETRIES,
            )?,
            bus_backend: self.bus_backend.trim().to_string(),
            bus_redis_url: optional_text(&self.bus_redis_url),
            use_copilot: self.use_copilot,
            copilot_token: optional_text(&self.copilot_token),
        })
    }

    /// Forget both write-only secrets.
    pub fn scrub_secrets(&mut self) {
        self.provider_key_value.clear();
        self.copilot_token.clear();
    }

    pub fn has_secrets(&self) -> bool {
        !self.provider_key_value.is_empty() || !self.copilot_token.is_empty()
    }

    pub fn set(&mut self, field: FormField, value: &str) -> Result<(), FormError> {
        let text = value.to_string();
        match field {
            FormField::BotName => self.bot_name = text,
            FormField::BotTone => self.bot_tone = text,
            FormField::ProviderActive => self.provider_active = text,
            FormField::ProviderBaseUrl => self.provider_base_url = text,
            FormField::ProviderModel => self.provider_model = text,
            FormField::ProviderKeyEnv => self.provider_key_env = text,
            FormField::ProviderKeyValue => self.provider_key_value = text,
            FormField::SandboxMode => self.sandbox_mode = parse_toggle(field, value)?,
            FormField::TailnetOnly => self.tailnet_only = parse_toggle(field, value)?,
            FormField::TailscaleCidrs => self.tailscale_cidrs = text,
            FormField::NodeAllowlist => self.node_allowlist = text,
            FormField::AllowedPaths => self.allowed_paths = text,
            FormField::MaxAgents => self.max_agents = text,
            FormField::PipelineMode => self.pipeline_mode = text,
            FormField::PipelineRetries => self.pipeline_retries = text,
            FormField::BusBackend => self.bus_backend = text,
            FormField::BusRedisUrl => self.bus_redis_url = text,
            FormField::UseCopilot => self.use_copilot = parse_toggle(field, value)?,
            FormField::CopilotToken => self.copilot_token = text,
        }
        Ok(())
    }

    /// Field value as the UI shows it. Secrets are masked.
    pub fn display(&self, field: FormField) -> String {
        let toggle = |on: bool| String::from(if on { "on" } else { "off" });
        let secret = |s: &str| if s.is_empty() { String::new() } else { "•".repeat(8) };
        match field {
            FormField::BotName => self.bot_name.clone(),
            FormField::BotTone => self.bot_tone.clone(),
            FormField::ProviderActive => self.provider_active.clone(),
            FormField::ProviderBaseUrl => self.provider_base_url.clone(),
            FormField::ProviderModel => self.provider_model.clone(),
            FormField::ProviderKeyEnv => self.provider_key_env.clone(),
            FormField::ProviderKeyValue => secret(&self.provider_key_value),
            FormField::SandboxMode => toggle(self.sandbox_mode),
            FormField::TailnetOnly => toggle(self.tailnet_only),
            FormField::TailscaleCidrs => self.tailscale_cidrs.clone(),
            FormField::NodeAllowlist => self.node_allowlist.clone(),
            FormField::AllowedPaths => self.allowed_paths.clone(),
            FormField::MaxAgents => self.max_agents.clone(),
            FormField::PipelineMode => self.pipeline_mode.clone(),
            FormField::PipelineRetries => self.pipeline_retries.clone(),
            FormField::BusBackend => self.bus_backend.clone(),
            FormField::BusRedisUrl => self.bus_redis_url.clone(),
            FormField::UseCopilot => toggle(self.use_copilot),
            FormField::CopilotToken => secret(&self.copilot_token),
        }
    }
}

/// Body of `/setup/apply`. Blank optional text is sent as `null`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SetupPatch {
    pub bot_name: Option<String>,
    pub bot_tone: Option<String>,
    pub provider_active: String,
    pub provider_base_url: Option<String>,
    pub provider_model: Option<String>,
    pub provider_api_key_env: Option<String>,
    pub provider_api_key_value: Option<String>,
    pub sandbox_mode: bool,
    pub tailnet_only: bool,
    pub tailscale_cidrs: Vec<String>,
    pub tailscale_node_allowlist: Vec<String>,
    pub allowed_paths: Vec<String>,
    pub max_active_agents: i64,
    pub pipeline_mode: String,
    pub pipeline_max_retries: i64,
    pub bus_backend: String,
    pub bus_redis_url: Option<String>,
    pub use_copilot: bool,
    pub copilot_token: Option<String>,
}

impl fmt::Debug for SetupPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupPatch")
            .field("provider_active", &self.provider_active)
            .field(
                "provider_api_key_value",
                &self.provider_api_key_value.as_deref().map(redacted),
            )
            .field("copilot_token", &self.copilot_token.as_deref().map(redacted))
            .finish_non_exhaustive()
    }
}
