use anyhow::Result;

use crate::commands::CommandReport;
use crate::env_loader::unknown_env_keys;
use crate::expire::config::load_config;
use crate::expire::paths::resolve_paths;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("lock_file={}", paths.lock_file.display()));
    if !paths.config_file.exists() {
        report.detail("config_file=missing (defaults in effect)");
    }

    match load_config(&paths) {
        Ok(cfg) => {
            report.detail(format!("policy.threshold_days={}", cfg.policy.threshold_days));
            report.detail(format!("policy.include_backups={}", cfg.policy.include_backups));
            report.detail(format!("policy.auto_run={}", cfg.policy.auto_run));
            report.detail(format!("server.base_url={}", cfg.server.base_url));
            report.detail(format!(
                "server.auth={}",
                if cfg.server.username.is_some() { "basic" } else { "none" }
            ));
            report.detail(format!("server.timeout_secs={}", cfg.server.timeout_secs));
            report.detail(format!("host.timezone={}", cfg.host.timezone));
            report.detail(format!("host.startup_delay_ms={}", cfg.host.startup_delay_ms));
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    for key in unknown_env_keys() {
        report.issue(format!("unrecognized environment variable {key}"));
    }

    Ok(report)
}
