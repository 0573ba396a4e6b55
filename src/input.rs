//! The operator's input line. Plain text is a chat message; a leading `/`
//! starts a command.

use thiserror::Error;

use crate::app::View;
use crate::setup::{FormError, FormField};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Chat(String),
    Help,
    Quit,
    /// `None` refreshes every view.
    Refresh(Option<View>),
    SelectSession(String),
    CreateSession {
        session_id: String,
        display_name: Option<String>,
    },
    SetupLoad,
    SetupApply,
    SetupTest,
    SetField {
        field: FormField,
        value: String,
    },
    ConfigLoad,
    ConfigEdit(String),
    ConfigSave,
    PolicyFile(String),
    PolicyShell(String),
    AuditVerify,
    CreateJob {
        name: String,
        cron: String,
        kind: String,
        text: String,
    },
    Webhook {
        source: String,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command: {0} (try /help)")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Form(#[from] FormError),
}

pub const HELP: &[&str] = &[
    "<text>                              send a chat message to the current session",
    "//<text>                            send a chat message that starts with /",
    "/session <id>                       switch session",
    "/session new <id> [name]            create a session",
    "/refresh [topology|agents|bus|audit|jobs|webhooks|sessions]",
    "/setup load | apply | test          load, apply or test the provider setup",
    "/set <field> <value>                edit a setup field",
    "/config load | save                 load or save the raw config",
    "/config edit <json>                 replace the raw config text",
    "/policy file <path>                 check a path against policy",
    "/policy shell <command>             check a shell command against policy",
    "/audit verify                       verify the audit chain",
    "/job <name> <cron> | <kind> [text]  schedule a job",
    "/webhook [source] [text]            post a webhook",
    "/quit                               leave",
];

/// Split off the first whitespace-separated word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Parse one submitted line. `Ok(None)` means there is nothing to do.
pub fn parse(line: &str) -> Result<Option<Action>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    // `//text` sends `/text` as chat.
    if let Some(text) = line.strip_prefix("//") {
        return Ok(Some(Action::Chat(format!("/{text}"))));
    }
    let Some(command_line) = line.strip_prefix('/') else {
        return Ok(Some(Action::Chat(line.to_string())));
    };

    let (command, rest) = split_word(command_line);
    let action = match command {
        "help" | "h" => Action::Help,
        "quit" | "exit" | "q" => Action::Quit,
        "refresh" | "r" => match rest {
            "" | "all" => Action::Refresh(None),
            name => Action::Refresh(Some(
                View::from_name(name).ok_or(InputError::Usage(
                    "/refresh [topology|agents|bus|audit|jobs|webhooks|sessions]",
                ))?,
            )),
        },
        "session" => parse_session(rest)?,
        "setup" => match rest {
            "load" => Action::SetupLoad,
            "apply" => Action::SetupApply,
            "test" => Action::SetupTest,
            _ => return Err(InputError::Usage("/setup load | apply | test")),
        },
        "set" => {
            let (name, value) = split_word(rest);
            if name.is_empty() {
                return Err(InputError::Usage("/set <field> <value>"));
            }
            Action::SetField {
                field: FormField::from_name(name)?,
                value: value.to_string(),
            }
        }
        "config" => {
            let (sub, json) = split_word(rest);
            match sub {
                "load" => Action::ConfigLoad,
                "save" => Action::ConfigSave,
                "edit" if !json.is_empty() => Action::ConfigEdit(json.to_string()),
                _ => return Err(InputError::Usage("/config load | save | edit <json>")),
            }
        }
        "policy" => {
            let (kind, target) = split_word(rest);
            match (kind, non_empty(target)) {
                ("file", Some(path)) => Action::PolicyFile(path),
                ("shell", Some(command)) => Action::PolicyShell(command),
                _ => return Err(InputError::Usage("/policy file <path> | shell <command>")),
            }
        }
        "audit" => match rest {
            "verify" => Action::AuditVerify,
            "" => Action::Refresh(Some(View::Audit)),
            _ => return Err(InputError::Usage("/audit [verify]")),
        },
        "job" => parse_job(rest)?,
        "webhook" => {
            let (source, text) = split_word(rest);
            Action::Webhook {
                source: non_empty(source).unwrap_or_else(|| "manual".to_string()),
                text: non_empty(text).unwrap_or_else(|| "Webhook".to_string()),
            }
        }
        other => return Err(InputError::UnknownCommand(format!("/{other}"))),
    };
    Ok(Some(action))
}

fn parse_session(rest: &str) -> Result<Action, InputError> {
    let (first, tail) = split_word(rest);
    match first {
        "" => Err(InputError::Usage("/session <id> | new <id> [name]")),
        "new" => {
            let (session_id, name) = split_word(tail);
            let session_id =
                non_empty(session_id).ok_or(InputError::Usage("/session new <id> [name]"))?;
            Ok(Action::CreateSession {
                session_id,
                display_name: non_empty(name),
            })
        }
        id => Ok(Action::SelectSession(id.to_string())),
    }
}

fn parse_job(rest: &str) -> Result<Action, InputError> {
    const USAGE: &str = "/job <name> <cron> | <kind> [text]";
    let (schedule, task) = rest.split_once('|').ok_or(InputError::Usage(USAGE))?;
    let (name, cron) = split_word(schedule);
    let (kind, text) = split_word(task);
    if name.is_empty() || cron.is_empty() || kind.is_empty() {
        return Err(InputError::Usage(USAGE));
    }
    Ok(Action::CreateJob {
        name: name.to_string(),
        cron: cron.to_string(),
        kind: kind.to_string(),
        text: text.to_string(),
    })
}
