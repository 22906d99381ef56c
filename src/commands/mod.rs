pub mod expire_auto;
pub mod expire_run;
pub mod settings;
pub mod status;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::error::ExpireError;
use crate::expire::config::ExpireConfig;
use crate::expire::pass::PassInputs;
use crate::expire::paths::ExpirePaths;
use crate::expire::session::SessionSelector;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn details<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(lines.into_iter().map(Into::into));
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Snapshot of config and clock taken once at the start of a pass.
pub fn pass_inputs(cfg: &ExpireConfig, selector: SessionSelector) -> Result<PassInputs> {
    Ok(PassInputs {
        policy: cfg.policy,
        selector,
        now: Utc::now(),
        tz: cfg.timezone()?,
    })
}

pub fn record_audit(paths: &ExpirePaths, mode: &str, status: &str, message: &str) {
    if let Err(err) = crate::expire::audit::append_event(paths, mode, status, message) {
        tracing::warn!("failed to append audit event: {err:#}");
    }
}

/// Audit status for a failed pass: the typed error code when there is one.
pub fn failure_status(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ExpireError>())
        .map_or("error", ExpireError::code)
}

/// Pass-level failure: logged in full, audited when the logs dir is known,
/// and surfaced only as `message`.
pub fn pass_failed(
    report: &mut CommandReport,
    paths: Option<&ExpirePaths>,
    mode: &str,
    err: &anyhow::Error,
    message: &str,
) {
    tracing::error!("{mode} pass failed: {err:#}");
    if let Some(paths) = paths {
        record_audit(paths, mode, failure_status(err), &format!("{err:#}"));
    }
    report.issue(message);
}
