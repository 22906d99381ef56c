use chrono::{DateTime, Utc};

use crate::expire::candidates::{BackupCandidate, ConversationCandidate};
use crate::expire::config::ExpirationPolicy;
use crate::expire::session::{SessionContext, is_active_conversation};
use crate::expire::window::is_expired;

/// Drops the open conversation, then keeps only expired chats. Input order is
/// preserved.
pub fn filter_conversations(
    candidates: Vec<ConversationCandidate>,
    policy: &ExpirationPolicy,
    session: &SessionContext,
    now: DateTime<Utc>,
) -> Vec<ConversationCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| !is_active_conversation(candidate, session))
        .filter(|candidate| is_expired(candidate.last_activity, policy.threshold_days, now))
        .collect()
}

pub fn filter_backups(
    candidates: Vec<BackupCandidate>,
    policy: &ExpirationPolicy,
    now: DateTime<Utc>,
) -> Vec<BackupCandidate> {
    if !policy.include_backups {
        return Vec::new();
    }
    candidates
        .into_iter()
        .filter(|backup| is_expired(backup.age_source(), policy.threshold_days, now))
        .collect()
}
