use anyhow::Result;

use crate::commands::CommandReport;
use crate::expire::config::{load_file_config, parse_threshold_input, save_policy};
use crate::expire::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct SettingsOptions {
    pub days: Option<String>,
    pub backups: Option<bool>,
    pub auto_run: Option<bool>,
}

impl SettingsOptions {
    fn changes_anything(&self) -> bool {
        self.days.is_some() || self.backups.is_some() || self.auto_run.is_some()
    }
}

/// Shows the persisted policy, applying any requested changes first.
pub fn run(opts: &SettingsOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("settings");
    let paths = resolve_paths()?;
    let mut policy = load_file_config(&paths)?.policy;

    if let Some(raw) = &opts.days {
        policy.threshold_days = parse_threshold_input(raw);
    }
    if let Some(backups) = opts.backups {
        policy.include_backups = backups;
    }
    if let Some(auto_run) = opts.auto_run {
        policy.auto_run = auto_run;
    }

    if opts.changes_anything() {
        let saved = save_policy(&paths, &policy)?;
        report.detail(format!("saved={}", saved.display()));
    }

    report.detail(format!("threshold_days={}", policy.threshold_days));
    report.detail(format!("include_backups={}", policy.include_backups));
    report.detail(format!("auto_run={}", policy.auto_run));
    Ok(report)
}
