use serde::Serialize;

use crate::expire::candidates::{BackupCandidate, ConversationCandidate};
use crate::expire::warn::{self, WarnEvent};
use crate::tavern::ChatStore;
use crate::tavern::types::MaintenanceToken;

/// Owns the maintenance token for the rest of a pass and releases it exactly
/// once: on `finalize`, or on drop if the pass exits any other way.
pub struct MaintenanceSession<'s> {
    store: &'s dyn ChatStore,
    token: Option<MaintenanceToken>,
}

impl<'s> MaintenanceSession<'s> {
    pub fn new(store: &'s dyn ChatStore, token: Option<MaintenanceToken>) -> Self {
        Self { store, token }
    }

    pub fn none(store: &'s dyn ChatStore) -> Self {
        Self { store, token: None }
    }

    pub fn token(&self) -> Option<&MaintenanceToken> {
        self.token.as_ref()
    }

    pub fn finalize(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if let Err(err) = self.store.finalize_maintenance(&token) {
            warn::emit(WarnEvent {
                code: "FINALIZE_FAILED",
                stage: "finalize",
                owner: "data-maid",
                item: token.as_str(),
                reason: "best-effort",
                err: &format!("{err:#}"),
            });
        }
    }
}

impl Drop for MaintenanceSession<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpirationOutcome {
    pub chat_successes: usize,
    pub chat_failures: usize,
    pub failed_chats: Vec<String>,
    pub backup_successes: usize,
    pub backup_failures: usize,
}

impl ExpirationOutcome {
    pub fn total_successes(&self) -> usize {
        self.chat_successes + self.backup_successes
    }

    pub fn total_failures(&self) -> usize {
        self.chat_failures + self.backup_failures
    }
}

fn describe_last_activity(chat: &ConversationCandidate) -> String {
    chat.last_activity
        .map(|ts| ts.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn delete_conversations(
    store: &dyn ChatStore,
    conversations: &[ConversationCandidate],
    outcome: &mut ExpirationOutcome,
) {
    if conversations.is_empty() {
        return;
    }
    tracing::info!(
        "deleting {} chat{}...",
        conversations.len(),
        plural(conversations.len())
    );

    for chat in conversations {
        tracing::info!(
            "deleting chat: {} - {} (last message: {})",
            chat.owner.name(),
            chat.chat_id(),
            describe_last_activity(chat)
        );
        match store.delete_chat(&chat.file_name, chat.owner.scope()) {
            Ok(()) => outcome.chat_successes += 1,
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "CHAT_DELETE_FAILED",
                    stage: "delete",
                    owner: chat.owner.name(),
                    item: &chat.file_name,
                    reason: "continue-with-remaining",
                    err: &format!("{err:#}"),
                });
                outcome.chat_failures += 1;
                outcome.failed_chats.push(chat.display_id());
            }
        }
    }
}

fn delete_backup_batch(
    store: &dyn ChatStore,
    backups: &[BackupCandidate],
    token: Option<&MaintenanceToken>,
    outcome: &mut ExpirationOutcome,
) {
    if backups.is_empty() {
        return;
    }
    let Some(token) = token else {
        tracing::warn!(
            "skipping {} backup{}: no maintenance token was issued",
            backups.len(),
            plural(backups.len())
        );
        return;
    };

    tracing::info!("deleting {} backup{}...", backups.len(), plural(backups.len()));
    for backup in backups {
        tracing::info!("deleting backup: {}", backup.file_name);
    }

    let hashes: Vec<String> = backups.iter().map(|b| b.content_hash.clone()).collect();
    // The service reports one status for the whole batch.
    match store.delete_backups(&hashes, token) {
        Ok(()) => outcome.backup_successes = backups.len(),
        Err(err) => {
            warn::emit(WarnEvent {
                code: "BACKUP_DELETE_FAILED",
                stage: "delete",
                owner: "data-maid",
                item: &format!("batch-of-{}", backups.len()),
                reason: "whole-batch-counted-failed",
                err: &format!("{err:#}"),
            });
            outcome.backup_failures = backups.len();
        }
    }
}

/// Deletes chats one by one, then backups in a single batch, then releases
/// the maintenance token. Per-item failures are counted and never stop the
/// remaining work.
pub fn execute(
    store: &dyn ChatStore,
    conversations: &[ConversationCandidate],
    backups: &[BackupCandidate],
    maintenance: MaintenanceSession<'_>,
) -> ExpirationOutcome {
    let mut outcome = ExpirationOutcome::default();
    delete_conversations(store, conversations, &mut outcome);
    delete_backup_batch(store, backups, maintenance.token(), &mut outcome);
    maintenance.finalize();

    tracing::info!(
        "expired {} chats and {} backups. {} failed.",
        outcome.chat_successes,
        outcome.backup_successes,
        outcome.total_failures()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expire::candidates::Owner;
    use crate::expire::testing::FakeStore;
    use serde_json::json;

    fn chat(avatar: &str, file: &str) -> ConversationCandidate {
        ConversationCandidate {
            owner: Owner::Character {
                index: 0,
                name: avatar.trim_end_matches(".png").to_string(),
                avatar: avatar.to_string(),
            },
            file_name: file.to_string(),
            last_activity: None,
        }
    }

    fn backup(name: &str, hash: &str) -> BackupCandidate {
        BackupCandidate {
            file_name: name.to_string(),
            content_hash: hash.to_string(),
            captured_at: None,
            mtime_fallback: None,
        }
    }

    #[test]
    fn chat_failure_is_counted_and_processing_continues() {
        let store = FakeStore::default();
        store.add_chat("a.png", "A - 1.jsonl", json!(0));
        store.add_chat("b.png", "B - 1.jsonl", json!(0));
        store.fail_delete_of("A - 1.jsonl");
        let token = MaintenanceToken::new("maid-1");

        let outcome = execute(
            &store,
            &[chat("a.png", "A - 1.jsonl"), chat("b.png", "B - 1.jsonl")],
            &[],
            MaintenanceSession::new(&store, Some(token)),
        );

        assert_eq!(outcome.chat_failures, 1);
        assert_eq!(outcome.chat_successes, 1);
        assert_eq!(outcome.failed_chats, vec!["a: A - 1.jsonl".to_string()]);
        assert_eq!(store.deleted_chats(), vec!["B - 1.jsonl".to_string()]);
        assert_eq!(store.finalized(), vec!["maid-1".to_string()]);
    }

    #[test]
    fn backup_batch_is_one_call_with_every_hash() {
        let store = FakeStore::default();
        let outcome = execute(
            &store,
            &[],
            &[backup("chat_a_20200101-000000.jsonl", "h1"), backup("chat_b_20200101-000000.jsonl", "h2")],
            MaintenanceSession::new(&store, Some(MaintenanceToken::new("maid-2"))),
        );

        assert_eq!(outcome.backup_successes, 2);
        assert_eq!(outcome.backup_failures, 0);
        assert_eq!(
            store.backup_delete_calls(),
            vec![vec!["h1".to_string(), "h2".to_string()]]
        );
        assert_eq!(store.finalized().len(), 1);
    }

    #[test]
    fn failed_batch_counts_every_backup_failed() {
        let store = FakeStore::default();
        store.fail_backup_delete();
        let outcome = execute(
            &store,
            &[],
            &[backup("x", "h1"), backup("y", "h2"), backup("z", "h3")],
            MaintenanceSession::new(&store, Some(MaintenanceToken::new("maid-3"))),
        );

        assert_eq!(outcome.backup_successes, 0);
        assert_eq!(outcome.backup_failures, 3);
        assert_eq!(store.finalized(), vec!["maid-3".to_string()]);
    }

    #[test]
    fn backups_without_token_are_not_attempted() {
        let store = FakeStore::default();
        let outcome = execute(
            &store,
            &[],
            &[backup("x", "h1")],
            MaintenanceSession::none(&store),
        );

        assert_eq!(outcome, ExpirationOutcome::default());
        assert!(store.backup_delete_calls().is_empty());
        assert!(store.finalized().is_empty());
    }

    #[test]
    fn empty_lists_still_finalize_the_token() {
        let store = FakeStore::default();
        execute(
            &store,
            &[],
            &[],
            MaintenanceSession::new(&store, Some(MaintenanceToken::new("maid-4"))),
        );
        assert_eq!(store.finalized(), vec!["maid-4".to_string()]);
    }

    #[test]
    fn dropped_session_finalizes_once() {
        let store = FakeStore::default();
        {
            let session = MaintenanceSession::new(&store, Some(MaintenanceToken::new("maid-5")));
            assert!(session.token().is_some());
        }
        assert_eq!(store.finalized(), vec!["maid-5".to_string()]);
    }

    #[test]
    fn finalize_failure_is_swallowed() {
        let store = FakeStore::default();
        store.fail_finalize();
        MaintenanceSession::new(&store, Some(MaintenanceToken::new("maid-6"))).finalize();
        assert_eq!(store.finalize_attempts(), 1);
    }
}
