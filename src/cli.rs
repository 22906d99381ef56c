use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::expire_auto::{self, ExpireAutoOptions};
use crate::commands::expire_run::{self, ExpireRunOptions};
use crate::commands::settings::{self, SettingsOptions};
use crate::commands::{CommandReport, status};
use crate::expire::config::parse_bool;
use crate::expire::session::SessionSelector;

#[derive(Debug, Parser)]
#[command(
    name = "chat-expire",
    version,
    about = "Expire stale SillyTavern chats and chat backups"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Preview expired chats, confirm, then delete them.
    Run(RunArgs),
    /// Silent pass for startup hooks; does nothing unless auto-run is on.
    Auto(AutoArgs),
    /// Show or change the retention policy.
    Settings(SettingsArgs),
    /// Show resolved paths and configuration.
    Status,
}

/// The chat currently open in the host. It is never expired.
#[derive(Debug, Clone, Default, Args)]
struct SessionArgs {
    /// Roster position of the active character.
    #[arg(long, conflicts_with = "active_group")]
    active_character: Option<usize>,
    /// Id of the active group.
    #[arg(long)]
    active_group: Option<String>,
    /// Open chat file; defaults to what the roster records for the owner.
    #[arg(long)]
    active_chat: Option<String>,
}

impl From<SessionArgs> for SessionSelector {
    fn from(args: SessionArgs) -> Self {
        Self {
            character: args.active_character,
            group: args.active_group,
            chat: args.active_chat,
        }
    }
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Delete without asking.
    #[arg(long, short = 'y')]
    yes: bool,
    /// Only show what would be deleted.
    #[arg(long, conflicts_with = "yes")]
    dry_run: bool,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Args)]
struct AutoArgs {
    /// Skip the startup delay.
    #[arg(long)]
    no_delay: bool,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// Days of inactivity before a chat expires (minimum 1).
    #[arg(long, allow_hyphen_values = true)]
    days: Option<String>,
    /// Also expire chat backups.
    #[arg(long, value_parser = parse_flag)]
    backups: Option<bool>,
    /// Run a silent pass from `chat-expire auto`.
    #[arg(long, value_parser = parse_flag)]
    auto_run: Option<bool>,
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    parse_bool(raw).ok_or_else(|| format!("expected true/false, got `{raw}`"))
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "failed" };
    println!("{}: {status}", report.command);
    for line in &report.details {
        println!("  {line}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Run(args) => expire_run::run(&ExpireRunOptions {
            yes: args.yes,
            dry_run: args.dry_run,
            selector: args.session.into(),
        })?,
        Command::Auto(args) => expire_auto::run(&ExpireAutoOptions {
            no_delay: args.no_delay,
            selector: args.session.into(),
        })?,
        Command::Settings(args) => settings::run(&SettingsOptions {
            days: args.days,
            backups: args.backups,
            auto_run: args.auto_run,
        })?,
        Command::Status => status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
