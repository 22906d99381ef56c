use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

use crate::expire::warn::{self, WarnEvent};
use crate::expire::window::{localize, parse_chat_timestamp};
use crate::tavern::ChatStore;
use crate::tavern::types::{
    BackupEntry, ChatFileEntry, MaintenanceToken, OwnerScope, RosterCharacter, RosterGroup,
};

pub const CHAT_EXTENSION: &str = ".jsonl";

static BACKUP_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{8}-\d{6})\.jsonl$").expect("backup stamp pattern"));
static BACKUP_CHAT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^chat_(.+?)_\d{8}-\d{6}\.jsonl$").expect("backup chat name pattern")
});

/// Characters and groups currently loaded on the host. A character's
/// position in `characters` is its identity for session matching.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub characters: Vec<RosterCharacter>,
    pub groups: Vec<RosterGroup>,
}

pub fn load_roster(store: &dyn ChatStore) -> Result<Roster> {
    let characters = store
        .list_characters()
        .context("failed to load characters")?;
    let groups = store.list_groups().context("failed to load groups")?;
    Ok(Roster { characters, groups })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Character {
        index: usize,
        name: String,
        avatar: String,
    },
    Group {
        id: String,
        name: String,
    },
}

impl Owner {
    pub fn name(&self) -> &str {
        match self {
            Self::Character { name, .. } | Self::Group { name, .. } => name.as_str(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }

    pub fn scope(&self) -> OwnerScope<'_> {
        match self {
            Self::Character { avatar, .. } => OwnerScope::Character {
                avatar: avatar.as_str(),
            },
            Self::Group { id, .. } => OwnerScope::Group { id: id.as_str() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationCandidate {
    pub owner: Owner,
    pub file_name: String,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ConversationCandidate {
    /// File name without its storage extension, as the session names it.
    pub fn chat_id(&self) -> &str {
        strip_chat_extension(&self.file_name)
    }

    /// `"{owner}: {file}"`, the identifier shown for failed deletions.
    pub fn display_id(&self) -> String {
        format!("{}: {}", self.owner.name(), self.file_name)
    }
}

pub fn strip_chat_extension(file_name: &str) -> &str {
    file_name.strip_suffix(CHAT_EXTENSION).unwrap_or(file_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCandidate {
    pub file_name: String,
    pub content_hash: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub mtime_fallback: Option<DateTime<Utc>>,
}

impl BackupCandidate {
    /// The filename's capture stamp wins; mtime only fills in when the name
    /// carries no valid stamp.
    pub fn age_source(&self) -> Option<DateTime<Utc>> {
        self.captured_at.or(self.mtime_fallback)
    }

    pub fn chat_name(&self) -> Option<&str> {
        BACKUP_CHAT_NAME
            .captures(&self.file_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Capture instant encoded as `_{YYYYMMDD}-{HHmmss}.jsonl`, read in `tz`.
pub fn parse_backup_stamp(file_name: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let stamp = BACKUP_STAMP.captures(file_name)?.get(1)?.as_str();
    let parsed = NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S")
        .ok()
        .and_then(|naive| localize(naive, tz));
    if parsed.is_none() {
        tracing::warn!("failed to parse backup timestamp: {file_name}, falling back to mtime");
    }
    parsed
}

fn conversation_candidate(owner: &Owner, entry: ChatFileEntry, tz: Tz) -> ConversationCandidate {
    let last_activity = entry
        .last_mes
        .as_ref()
        .and_then(|value| parse_chat_timestamp(value, tz));
    ConversationCandidate {
        owner: owner.clone(),
        file_name: entry.file_name,
        last_activity,
    }
}

fn backup_candidate(entry: BackupEntry, tz: Tz) -> BackupCandidate {
    BackupCandidate {
        captured_at: parse_backup_stamp(&entry.name, tz),
        mtime_fallback: entry
            .mtime
            .as_ref()
            .and_then(|value| parse_chat_timestamp(value, tz)),
        file_name: entry.name,
        content_hash: entry.hash,
    }
}

fn roster_owners(roster: &Roster) -> Vec<Owner> {
    let characters = roster
        .characters
        .iter()
        .enumerate()
        .filter_map(|(index, character)| {
            let avatar = character.avatar.as_deref().map(str::trim)?;
            if avatar.is_empty() {
                return None;
            }
            Some(Owner::Character {
                index,
                name: character.name.clone(),
                avatar: avatar.to_string(),
            })
        });
    let groups = roster.groups.iter().filter_map(|group| {
        let id = group.id.as_deref()?;
        Some(Owner::Group {
            id: id.to_string(),
            name: group.name.clone(),
        })
    });
    characters.chain(groups).collect()
}

fn owner_chats(store: &dyn ChatStore, owner: &Owner, tz: Tz) -> Result<Vec<ConversationCandidate>> {
    let entries = store.search_chats(owner.scope())?;
    Ok(entries
        .into_iter()
        .map(|entry| conversation_candidate(owner, entry, tz))
        .collect())
}

/// Queries every owner in turn and unions the results. Owners without an
/// identity are skipped; an owner whose query fails contributes nothing.
pub fn collect_conversations(
    store: &dyn ChatStore,
    roster: &Roster,
    tz: Tz,
) -> Vec<ConversationCandidate> {
    let mut out = Vec::new();
    for owner in roster_owners(roster) {
        let chats = owner_chats(store, &owner, tz).unwrap_or_else(|err| {
            warn::emit(WarnEvent {
                code: "CHAT_SEARCH_FAILED",
                stage: "collect",
                owner: owner.name(),
                item: if owner.is_group() { "group" } else { "character" },
                reason: "owner-contributes-nothing",
                err: &format!("{err:#}"),
            });
            Vec::new()
        });
        out.extend(chats);
    }
    out
}

/// One maintenance-report fetch. Failure yields no candidates and no token.
pub fn collect_backups(
    store: &dyn ChatStore,
    tz: Tz,
) -> (Vec<BackupCandidate>, Option<MaintenanceToken>) {
    match store.maintenance_report() {
        Ok(report) => {
            let backups = report
                .backups
                .into_iter()
                .map(|entry| backup_candidate(entry, tz))
                .collect();
            (backups, report.token)
        }
        Err(err) => {
            warn::emit(WarnEvent {
                code: "BACKUP_REPORT_FAILED",
                stage: "collect",
                owner: "data-maid",
                item: "report",
                reason: "backups-skipped",
                err: &format!("{err:#}"),
            });
            (Vec::new(), None)
        }
    }
}
