use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::expire::warn::{self, WarnEvent};

/// Whose chats a search or delete is scoped to. The two are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerScope<'a> {
    Character { avatar: &'a str },
    Group { id: &'a str },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterCharacter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub chat: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterGroup {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatFileEntry {
    pub file_name: String,
    #[serde(default)]
    pub last_mes: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupEntry {
    pub name: String,
    pub hash: String,
    #[serde(default)]
    pub mtime: Option<Value>,
}

/// Handle over a server-side backup report snapshot. Must be finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaintenanceToken(String);

impl MaintenanceToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub backups: Vec<BackupEntry>,
    pub token: Option<MaintenanceToken>,
}

/// Raw report response. Only the envelope is typed so that a bad backup
/// entry can never cost the token the server already issued.
#[derive(Debug, Deserialize)]
pub(crate) struct ReportEnvelope {
    #[serde(default)]
    pub report: Value,
    #[serde(default, deserialize_with = "string_or_number")]
    pub token: Option<String>,
}

impl ReportEnvelope {
    /// Maps `report.chatBackups` one entry at a time; entries that do not
    /// parse are skipped with a warning.
    pub fn into_report(self) -> MaintenanceReport {
        let entries = match self.report {
            Value::Object(mut body) => match body.remove("chatBackups") {
                Some(Value::Array(entries)) => entries,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    skip_entry("chatBackups", &format!("expected array, got {other}"));
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let mut backups = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<BackupEntry>(entry) {
                Ok(backup) => backups.push(backup),
                Err(err) => skip_entry(&format!("chatBackups[{index}]"), &err.to_string()),
            }
        }

        MaintenanceReport {
            backups,
            token: self.token.map(MaintenanceToken::new),
        }
    }
}

fn skip_entry(item: &str, err: &str) {
    warn::emit(WarnEvent {
        code: "BACKUP_ENTRY_INVALID",
        stage: "collect",
        owner: "data-maid",
        item,
        reason: "entry-skipped",
        err,
    });
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
