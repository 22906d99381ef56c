use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::expire::candidates::{BackupCandidate, ConversationCandidate};
use crate::expire::config::ExpirationPolicy;
use crate::expire::orchestrator::ExpirationOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

/// What a pass is about to delete. Purely descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpirationPreview {
    pub threshold_days: u32,
    pub include_backups: bool,
    pub chat_total: usize,
    pub character_chats: usize,
    pub group_chats: usize,
    pub chats_by_owner: Vec<NameCount>,
    pub backup_total: usize,
    pub backups_by_chat: Vec<NameCount>,
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Highest count first; ties in case-insensitive name order.
fn ranked(counts: BTreeMap<String, usize>) -> Vec<NameCount> {
    let mut out: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount { name, count })
        .collect();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| compare_names(&a.name, &b.name))
    });
    out
}

pub fn preview(
    chats: &[ConversationCandidate],
    backups: &[BackupCandidate],
    policy: &ExpirationPolicy,
) -> ExpirationPreview {
    let group_chats = chats.iter().filter(|c| c.owner.is_group()).count();

    let mut by_owner = BTreeMap::new();
    for chat in chats {
        *by_owner.entry(chat.owner.name().to_string()).or_insert(0) += 1;
    }

    // Backups whose name does not follow the convention still count toward
    // the total but have no chat to be listed under.
    let mut by_chat = BTreeMap::new();
    for name in backups.iter().filter_map(BackupCandidate::chat_name) {
        *by_chat.entry(name.to_string()).or_insert(0) += 1;
    }

    ExpirationPreview {
        threshold_days: policy.threshold_days,
        include_backups: policy.include_backups,
        chat_total: chats.len(),
        character_chats: chats.len() - group_chats,
        group_chats,
        chats_by_owner: ranked(by_owner),
        backup_total: backups.len(),
        backups_by_chat: ranked(by_chat),
    }
}

impl ExpirationPreview {
    pub fn lines(&self) -> Vec<String> {
        let days = self.threshold_days;
        let mut out = Vec::new();

        if self.chat_total > 0 {
            out.push(format!(
                "Found {} older than {days} days:",
                plural(self.chat_total, "chat")
            ));
            out.push(format!("  {}", plural(self.character_chats, "character chat")));
            out.push(format!("  {}", plural(self.group_chats, "group chat")));
            out.push("Chats:".to_string());
            for entry in &self.chats_by_owner {
                out.push(format!("  {}: {}", entry.name, plural(entry.count, "chat")));
            }
        }

        if self.include_backups && self.backup_total > 0 {
            out.push(format!(
                "Found {} older than {days} days:",
                plural(self.backup_total, "backup")
            ));
            for entry in &self.backups_by_chat {
                out.push(format!("  {}: {}", entry.name, plural(entry.count, "backup")));
            }
        }

        out.push("This action cannot be undone!".to_string());
        out
    }
}

pub fn nothing_to_expire(policy: &ExpirationPolicy) -> String {
    if policy.include_backups {
        format!(
            "No chats or backups found older than {} days.",
            policy.threshold_days
        )
    } else {
        format!("No chats found older than {} days.", policy.threshold_days)
    }
}

/// Result report shown after a manual pass.
pub fn result_lines(preview: &ExpirationPreview, outcome: &ExpirationOutcome) -> Vec<String> {
    let mut out = vec!["Expiration complete".to_string()];

    if preview.chat_total > 0 {
        out.push("Chats:".to_string());
        out.push(format!("  Successfully deleted: {}", outcome.chat_successes));
        if outcome.chat_failures > 0 {
            out.push(format!("  Failed to delete: {}", outcome.chat_failures));
        }
    }

    if preview.backup_total > 0 {
        out.push("Backups:".to_string());
        out.push(format!("  Successfully deleted: {}", outcome.backup_successes));
        if outcome.backup_failures > 0 {
            out.push(format!("  Failed to delete: {}", outcome.backup_failures));
        }
    }

    if !outcome.failed_chats.is_empty() {
        out.push("Failed chats:".to_string());
        for failed in &outcome.failed_chats {
            out.push(format!("  {failed}"));
        }
    }
    out
}

/// One-line notification for the unattended pass.
pub fn notification(outcome: &ExpirationOutcome) -> String {
    let chats = outcome.chat_successes;
    let backups = outcome.backup_successes;
    let mut message = match (chats > 0, backups > 0) {
        (true, true) => format!(
            "Expired {} and {}",
            plural(chats, "chat"),
            plural(backups, "backup")
        ),
        (true, false) => format!("Expired {}", plural(chats, "chat")),
        (false, true) => format!("Expired {}", plural(backups, "backup")),
        (false, false) => format!("Expired {}", plural(outcome.total_successes(), "item")),
    };

    let failed = outcome.total_failures();
    if failed > 0 {
        message.push_str(&format!(" ({failed} failed)"));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expire::candidates::Owner;

    fn chat(owner: Owner) -> ConversationCandidate {
        ConversationCandidate {
            owner,
            file_name: "x.jsonl".to_string(),
            last_activity: None,
        }
    }

    fn character(name: &str) -> Owner {
        Owner::Character {
            index: 0,
            name: name.to_string(),
            avatar: format!("{name}.png"),
        }
    }

    fn backup(name: &str) -> BackupCandidate {
        BackupCandidate {
            file_name: name.to_string(),
            content_hash: "h".to_string(),
            captured_at: None,
            mtime_fallback: None,
        }
    }

    fn policy(include_backups: bool) -> ExpirationPolicy {
        ExpirationPolicy {
            threshold_days: 90,
            include_backups,
            auto_run: false,
        }
    }

    #[test]
    fn owners_rank_by_count_then_name() {
        let chats = vec![
            chat(character("bob")),
            chat(character("Zed")),
            chat(character("Zed")),
            chat(character("alice")),
            chat(Owner::Group {
                id: "g".to_string(),
                name: "Guild".to_string(),
            }),
        ];

        let p = preview(&chats, &[], &policy(false));

        let order: Vec<(&str, usize)> = p
            .chats_by_owner
            .iter()
            .map(|e| (e.name.as_str(), e.count))
            .collect();
        assert_eq!(order, vec![("Zed", 2), ("alice", 1), ("bob", 1), ("Guild", 1)]);
        assert_eq!(p.character_chats, 4);
        assert_eq!(p.group_chats, 1);
    }

    #[test]
    fn backups_group_by_chat_name() {
        let backups = vec![
            backup("chat_seraphina_20250101-120000.jsonl"),
            backup("chat_seraphina_20250102-120000.jsonl"),
            backup("chat_aqua_20250101-120000.jsonl"),
            backup("stray.jsonl"),
        ];
        let p = preview(&[], &backups, &policy(true));
        assert_eq!(p.backup_total, 4);
        assert_eq!(
            p.backups_by_chat,
            vec![
                NameCount {
                    name: "seraphina".to_string(),
                    count: 2
                },
                NameCount {
                    name: "aqua".to_string(),
                    count: 1
                },
            ]
        );
        assert!(p.lines().contains(&"Found 4 backups older than 90 days:".to_string()));
    }

    #[test]
    fn preview_lines_pluralize() {
        let p = preview(&[chat(character("Aqua"))], &[], &policy(false));
        let lines = p.lines();
        assert_eq!(lines[0], "Found 1 chat older than 90 days:");
        assert_eq!(lines[1], "  1 character chat");
        assert_eq!(lines[2], "  0 group chats");
        assert!(lines.contains(&"  Aqua: 1 chat".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("This action cannot be undone!"));
    }

    #[test]
    fn nothing_message_mentions_backups_only_when_enabled() {
        assert_eq!(
            nothing_to_expire(&policy(false)),
            "No chats found older than 90 days."
        );
        assert_eq!(
            nothing_to_expire(&policy(true)),
            "No chats or backups found older than 90 days."
        );
    }

    #[test]
    fn notification_variants() {
        let both = ExpirationOutcome {
            chat_successes: 3,
            backup_successes: 1,
            chat_failures: 1,
            failed_chats: vec!["a: b.jsonl".to_string()],
            backup_failures: 0,
        };
        assert_eq!(notification(&both), "Expired 3 chats and 1 backup (1 failed)");

        let backups_only = ExpirationOutcome {
            backup_successes: 2,
            ..ExpirationOutcome::default()
        };
        assert_eq!(notification(&backups_only), "Expired 2 backups");

        let all_failed = ExpirationOutcome {
            chat_failures: 2,
            failed_chats: vec!["x".to_string(), "y".to_string()],
            ..ExpirationOutcome::default()
        };
        assert_eq!(notification(&all_failed), "Expired 0 items (2 failed)");
    }

    #[test]
    fn result_lists_failed_chats() {
        let p = preview(&[chat(character("Aqua"))], &[], &policy(false));
        let outcome = ExpirationOutcome {
            chat_failures: 1,
            failed_chats: vec!["Aqua: x.jsonl".to_string()],
            ..ExpirationOutcome::default()
        };
        let lines = result_lines(&p, &outcome);
        assert_eq!(
            lines,
            vec![
                "Expiration complete",
                "Chats:",
                "  Successfully deleted: 0",
                "  Failed to delete: 1",
                "Failed chats:",
                "  Aqua: x.jsonl",
            ]
        );
    }
}
