use anyhow::Result;
use std::thread;
use std::time::Duration;

use crate::commands::{CommandReport, pass_failed, pass_inputs, record_audit};
use crate::expire::config::{ExpireConfig, load_config};
use crate::expire::pass::{AutoPassOutcome, acquire_pass_lock, run_auto};
use crate::expire::paths::{ExpirePaths, resolve_paths};
use crate::expire::report;
use crate::expire::session::SessionSelector;
use crate::tavern::client::TavernClient;

const AUTO_FAILED: &str = "Failed to auto-expire chats. Check the log for details.";

#[derive(Debug, Clone, Default)]
pub struct ExpireAutoOptions {
    pub no_delay: bool,
    pub selector: SessionSelector,
}

fn auto_pass(
    paths: &ExpirePaths,
    cfg: &ExpireConfig,
    selector: &SessionSelector,
) -> Result<AutoPassOutcome> {
    let _lock = acquire_pass_lock(&paths.lock_file)?;
    let inputs = pass_inputs(cfg, selector.clone())?;
    let store = TavernClient::connect(&cfg.server)?;
    run_auto(&store, &inputs)
}

/// Startup hook: runs one silent pass when auto-run is enabled and reports a
/// single notification line.
pub fn run(opts: &ExpireAutoOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("auto");
    let paths = match resolve_paths() {
        Ok(paths) => paths,
        Err(err) => {
            pass_failed(&mut report, None, "auto", &err, AUTO_FAILED);
            return Ok(report);
        }
    };
    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            pass_failed(&mut report, Some(&paths), "auto", &err, AUTO_FAILED);
            return Ok(report);
        }
    };

    if !cfg.policy.auto_run {
        report.detail("auto-run disabled; nothing to do");
        return Ok(report);
    }

    if !opts.no_delay && cfg.host.startup_delay_ms > 0 {
        thread::sleep(Duration::from_millis(cfg.host.startup_delay_ms));
    }

    match auto_pass(&paths, &cfg, &opts.selector) {
        Ok(AutoPassOutcome::NothingToExpire) => {
            record_audit(&paths, "auto", "nothing", "nothing to expire");
        }
        Ok(AutoPassOutcome::Completed { outcome }) => {
            let message = report::notification(&outcome);
            tracing::info!("{message}");
            record_audit(&paths, "auto", "completed", &message);
            report.detail(message);
        }
        Err(err) => pass_failed(&mut report, Some(&paths), "auto", &err, AUTO_FAILED),
    }

    Ok(report)
}
