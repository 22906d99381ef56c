use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

use crate::commands::{CommandReport, pass_failed, pass_inputs, record_audit};
use crate::expire::config::{ExpireConfig, load_config};
use crate::expire::pass::{Confirm, ManualPassOutcome, acquire_pass_lock, run_manual};
use crate::expire::paths::{ExpirePaths, resolve_paths};
use crate::expire::report::{self, ExpirationPreview};
use crate::expire::session::SessionSelector;
use crate::tavern::client::TavernClient;

const SCAN_FAILED: &str =
    "An error occurred while scanning chats. Check the log for details.";

#[derive(Debug, Clone, Default)]
pub struct ExpireRunOptions {
    pub yes: bool,
    pub dry_run: bool,
    pub selector: SessionSelector,
}

/// Shows the preview on stderr and waits for a yes/no answer, so stdout
/// carries only the command report.
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, preview: &ExpirationPreview) -> Result<bool> {
        let mut stderr = io::stderr().lock();
        for line in preview.lines() {
            writeln!(stderr, "{line}")?;
        }
        write!(stderr, "Delete these items? [y/N]: ")?;
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("failed to read confirmation")?;
        Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES" | "Yes"))
    }
}

/// Answers without a prompt: `--yes` accepts, `--dry-run` declines.
struct FixedAnswer(bool);

impl Confirm for FixedAnswer {
    fn confirm(&mut self, _preview: &ExpirationPreview) -> Result<bool> {
        Ok(self.0)
    }
}

fn manual_pass(
    paths: &ExpirePaths,
    cfg: &ExpireConfig,
    opts: &ExpireRunOptions,
) -> Result<ManualPassOutcome> {
    let _lock = acquire_pass_lock(&paths.lock_file)?;
    let inputs = pass_inputs(cfg, opts.selector.clone())?;
    let store = TavernClient::connect(&cfg.server)?;
    if opts.dry_run {
        run_manual(&store, &inputs, &mut FixedAnswer(false))
    } else if opts.yes {
        run_manual(&store, &inputs, &mut FixedAnswer(true))
    } else {
        run_manual(&store, &inputs, &mut TerminalConfirm)
    }
}

pub fn run(opts: &ExpireRunOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("run");

    if opts.yes && opts.dry_run {
        report.issue("invalid flags: use only one of --yes or --dry-run");
        return Ok(report);
    }

    let paths = match resolve_paths() {
        Ok(paths) => paths,
        Err(err) => {
            pass_failed(&mut report, None, "manual", &err, SCAN_FAILED);
            return Ok(report);
        }
    };
    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            pass_failed(&mut report, Some(&paths), "manual", &err, SCAN_FAILED);
            return Ok(report);
        }
    };
    report.detail(format!("threshold_days={}", cfg.policy.threshold_days));
    report.detail(format!("include_backups={}", cfg.policy.include_backups));

    let outcome = manual_pass(&paths, &cfg, opts);

    match outcome {
        Ok(ManualPassOutcome::NothingToExpire { message }) => {
            record_audit(&paths, "manual", "nothing", &message);
            report.detail(message);
        }
        Ok(ManualPassOutcome::Cancelled { preview }) => {
            if opts.dry_run {
                report.details(preview.lines());
                report.detail("dry run: nothing deleted");
            } else {
                report.detail("cancelled: nothing deleted");
            }
            record_audit(&paths, "manual", "cancelled", "nothing deleted");
        }
        Ok(ManualPassOutcome::Completed { preview, outcome }) => {
            if opts.yes {
                report.details(preview.lines());
            }
            report.details(report::result_lines(&preview, &outcome));
            let summary = report::notification(&outcome);
            record_audit(&paths, "manual", "completed", &summary);
            if outcome.total_failures() > 0 {
                report.issue(summary);
            }
        }
        Err(err) => pass_failed(&mut report, Some(&paths), "manual", &err, SCAN_FAILED),
    }

    Ok(report)
}
