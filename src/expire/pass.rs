use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::ExpireError;
use crate::expire::candidates::{
    BackupCandidate, ConversationCandidate, collect_backups, collect_conversations, load_roster,
};
use crate::expire::config::ExpirationPolicy;
use crate::expire::filter::{filter_backups, filter_conversations};
use crate::expire::orchestrator::{self, ExpirationOutcome, MaintenanceSession};
use crate::expire::report::{self, ExpirationPreview};
use crate::expire::session::{SessionContext, SessionSelector};
use crate::tavern::ChatStore;

/// Everything one pass reads up front. Nothing here is re-read mid-pass.
#[derive(Debug, Clone)]
pub struct PassInputs {
    pub policy: ExpirationPolicy,
    pub selector: SessionSelector,
    pub now: DateTime<Utc>,
    pub tz: Tz,
}

pub struct ExpiredItems<'s> {
    pub session: SessionContext,
    pub chats: Vec<ConversationCandidate>,
    pub backups: Vec<BackupCandidate>,
    pub maintenance: MaintenanceSession<'s>,
}

impl ExpiredItems<'_> {
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty() && self.backups.is_empty()
    }
}

/// Aggregates and filters both candidate classes. The backup report (and
/// with it the maintenance token) is only requested when backups are in
/// scope.
pub fn gather_expired<'s>(store: &'s dyn ChatStore, inputs: &PassInputs) -> Result<ExpiredItems<'s>> {
    let roster = load_roster(store)?;
    let session = SessionContext::resolve(&inputs.selector, &roster);

    let conversations = collect_conversations(store, &roster, inputs.tz);
    let chats = filter_conversations(conversations, &inputs.policy, &session, inputs.now);

    let (backups, maintenance) = if inputs.policy.include_backups {
        let (candidates, token) = collect_backups(store, inputs.tz);
        let maintenance = MaintenanceSession::new(store, token);
        (filter_backups(candidates, &inputs.policy, inputs.now), maintenance)
    } else {
        (Vec::new(), MaintenanceSession::none(store))
    };

    Ok(ExpiredItems {
        session,
        chats,
        backups,
        maintenance,
    })
}

/// Asks whoever started a manual pass whether to go ahead.
pub trait Confirm {
    fn confirm(&mut self, preview: &ExpirationPreview) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManualPassOutcome {
    NothingToExpire {
        message: String,
    },
    Cancelled {
        preview: ExpirationPreview,
    },
    Completed {
        preview: ExpirationPreview,
        outcome: ExpirationOutcome,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AutoPassOutcome {
    NothingToExpire,
    Completed { outcome: ExpirationOutcome },
}

/// Preview, confirm, then delete. Declining releases the maintenance token
/// without deleting anything.
pub fn run_manual(
    store: &dyn ChatStore,
    inputs: &PassInputs,
    confirm: &mut dyn Confirm,
) -> Result<ManualPassOutcome> {
    let ExpiredItems {
        session,
        chats,
        backups,
        maintenance,
    } = gather_expired(store, inputs)?;
    tracing::debug!(
        active_file = session.active_file.as_deref().unwrap_or("-"),
        "resolved active conversation"
    );

    if chats.is_empty() && backups.is_empty() {
        maintenance.finalize();
        return Ok(ManualPassOutcome::NothingToExpire {
            message: report::nothing_to_expire(&inputs.policy),
        });
    }

    let preview = report::preview(&chats, &backups, &inputs.policy);
    if !confirm.confirm(&preview)? {
        tracing::info!("expiration cancelled at confirmation");
        maintenance.finalize();
        return Ok(ManualPassOutcome::Cancelled { preview });
    }

    let outcome = orchestrator::execute(store, &chats, &backups, maintenance);
    Ok(ManualPassOutcome::Completed { preview, outcome })
}

/// Unattended pass: deletes whatever is expired without asking.
pub fn run_auto(store: &dyn ChatStore, inputs: &PassInputs) -> Result<AutoPassOutcome> {
    let items = gather_expired(store, inputs)?;
    if items.is_empty() {
        items.maintenance.finalize();
        return Ok(AutoPassOutcome::NothingToExpire);
    }

    tracing::info!(
        "auto-expiring {} chats and {} backups",
        items.chats.len(),
        items.backups.len()
    );
    let outcome = orchestrator::execute(store, &items.chats, &items.backups, items.maintenance);
    Ok(AutoPassOutcome::Completed { outcome })
}

/// Exclusive hold on the pass lock file; released when dropped.
#[derive(Debug)]
pub struct PassLock {
    file: File,
}

impl Drop for PassLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn acquire_pass_lock(lock_path: &Path) -> Result<PassLock> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .with_context(|| format!("failed to open {}", lock_path.display()))?;

    if file.try_lock_exclusive().is_err() {
        return Err(ExpireError::PassLocked(lock_path.display().to_string()).into());
    }

    let payload = serde_json::json!({
        "pid": std::process::id(),
        "start_time": Utc::now().to_rfc3339(),
    });
    file.set_len(0)?;
    file.write_all(format!("{payload}\n").as_bytes())?;
    Ok(PassLock { file })
}
