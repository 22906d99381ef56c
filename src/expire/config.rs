use crate::error::ExpireError;
use crate::expire::paths::ExpirePaths;
use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const DEFAULT_THRESHOLD_DAYS: u32 = 90;

/// Retention policy for one expiration pass.
///
/// Loaded fresh at the start of every pass and passed by value afterwards, so
/// a settings change mid-pass never affects the pass already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationPolicy {
    pub threshold_days: u32,
    pub include_backups: bool,
    pub auto_run: bool,
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            include_backups: false,
            auto_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub timezone: String,
    pub startup_delay_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            startup_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExpireConfig {
    pub policy: ExpirationPolicy,
    pub server: ServerConfig,
    pub host: HostConfig,
}

impl ExpireConfig {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.host.timezone)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialExpireConfig {
    policy: Option<ExpirationPolicy>,
    server: Option<ServerConfig>,
    host: Option<HostConfig>,
}

/// Clamps a user-supplied day count to the minimum of one day.
pub fn clamp_threshold_days(value: i64) -> u32 {
    value.clamp(1, i64::from(u32::MAX)) as u32
}

/// Interprets free-form day input the way the settings field always has: the
/// leading integer is taken, zero or garbage falls back to the default, and
/// anything below one day is raised to one.
pub fn parse_threshold_input(raw: &str) -> u32 {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let leading: String = digits.chars().take_while(char::is_ascii_digit).collect();
    let parsed = leading
        .parse::<i64>()
        .ok()
        .map(|v| v.saturating_mul(sign))
        .filter(|v| *v != 0)
        .unwrap_or(i64::from(DEFAULT_THRESHOLD_DAYS));
    clamp_threshold_days(parsed)
}

fn parse_timezone(raw: &str) -> Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|err| anyhow!("invalid host timezone `{}`: {err}", raw.trim()))
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => parse_bool(&v).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "on" => Some(true),
        "0" | "false" | "FALSE" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate(cfg: &mut ExpireConfig) -> Result<()> {
    // A stored zero means "never set"; it has always read back as the default.
    if cfg.policy.threshold_days == 0 {
        cfg.policy.threshold_days = DEFAULT_THRESHOLD_DAYS;
    }
    let base = cfg.server.base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ExpireError::InvalidConfig(format!(
            "server base url must start with http:// or https://, got `{base}`"
        ))
        .into());
    }
    if cfg.server.timeout_secs == 0 {
        return Err(ExpireError::InvalidConfig(
            "server timeout must be >= 1 second".to_string(),
        )
        .into());
    }
    if cfg.server.username.is_some() != cfg.server.password.is_some() {
        return Err(ExpireError::InvalidConfig(
            "server username and password must be set together".to_string(),
        )
        .into());
    }
    parse_timezone(&cfg.host.timezone)?;
    Ok(())
}

/// Defaults merged with the settings file, without env overrides.
pub fn load_file_config(paths: &ExpirePaths) -> Result<ExpireConfig> {
    let mut cfg = ExpireConfig::default();
    let path = &paths.config_file;
    if !path.exists() {
        return Ok(cfg);
    }

    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: PartialExpireConfig = toml::from_str(&raw).map_err(|err| {
        ExpireError::InvalidConfig(format!("failed to parse {}: {err}", path.display()))
    })?;
    if let Some(policy) = parsed.policy {
        cfg.policy = policy;
    }
    if let Some(server) = parsed.server {
        cfg.server = server;
    }
    if let Some(host) = parsed.host {
        cfg.host = host;
    }
    Ok(cfg)
}

pub fn load_config(paths: &ExpirePaths) -> Result<ExpireConfig> {
    let mut cfg = load_file_config(paths)?;

    if let Ok(raw) = env::var("CHAT_EXPIRE_DAYS")
        && !raw.trim().is_empty()
    {
        cfg.policy.threshold_days = parse_threshold_input(&raw);
    }
    cfg.policy.include_backups = env_or_bool("CHAT_EXPIRE_BACKUPS", cfg.policy.include_backups);
    cfg.policy.auto_run = env_or_bool("CHAT_EXPIRE_AUTO_RUN", cfg.policy.auto_run);
    cfg.server.base_url = env_or_string("CHAT_EXPIRE_BASE_URL", &cfg.server.base_url);
    cfg.server.username = env_or_optional("CHAT_EXPIRE_USERNAME", cfg.server.username.take());
    cfg.server.password = env_or_optional("CHAT_EXPIRE_PASSWORD", cfg.server.password.take());
    cfg.server.timeout_secs = env_or_u64("CHAT_EXPIRE_TIMEOUT_SECS", cfg.server.timeout_secs);
    cfg.host.timezone = env_or_string("CHAT_EXPIRE_TIMEZONE", &cfg.host.timezone);
    cfg.host.startup_delay_ms =
        env_or_u64("CHAT_EXPIRE_STARTUP_DELAY_MS", cfg.host.startup_delay_ms);

    validate(&mut cfg)?;
    Ok(cfg)
}

/// Persists `policy` into the settings file, keeping the other sections as
/// they are on disk.
pub fn save_policy(paths: &ExpirePaths, policy: &ExpirationPolicy) -> Result<PathBuf> {
    let mut cfg = load_file_config(paths)?;
    cfg.policy = *policy;
    cfg.policy.threshold_days = clamp_threshold_days(i64::from(cfg.policy.threshold_days));

    let path = paths.config_file.clone();
    let parent = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let data = toml::to_string_pretty(&cfg).context("failed to serialize settings")?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to stage settings in {}", parent.display()))?;
    tmp.write_all(data.as_bytes())?;
    tmp.persist(&path)
        .map_err(|err| anyhow!("failed to write {}: {}", path.display(), err.error))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn temp_paths(root: &std::path::Path) -> ExpirePaths {
        ExpirePaths {
            home: root.to_path_buf(),
            config_file: root.join("config.toml"),
            logs_dir: root.join("logs"),
            lock_file: root.join("logs/expire-pass.lock"),
        }
    }

    #[test]
    fn threshold_input_clamps_and_falls_back() {
        assert_eq!(parse_threshold_input("30"), 30);
        assert_eq!(parse_threshold_input(" 45days"), 45);
        assert_eq!(parse_threshold_input("-5"), 1);
        assert_eq!(parse_threshold_input("0"), DEFAULT_THRESHOLD_DAYS);
        assert_eq!(parse_threshold_input("soon"), DEFAULT_THRESHOLD_DAYS);
        assert_eq!(parse_threshold_input(""), DEFAULT_THRESHOLD_DAYS);
    }

    #[test]
    fn clamp_never_goes_below_one_day() {
        assert_eq!(clamp_threshold_days(0), 1);
        assert_eq!(clamp_threshold_days(-40), 1);
        assert_eq!(clamp_threshold_days(7), 7);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().expect("tempdir");
        let cfg = load_file_config(&temp_paths(tmp.path())).expect("load");
        assert_eq!(cfg.policy, ExpirationPolicy::default());
        assert_eq!(cfg.host.timezone, "UTC");
    }

    #[test]
    fn partial_sections_merge_over_defaults() {
        let tmp = tempdir().expect("tempdir");
        let paths = temp_paths(tmp.path());
        fs::write(
            &paths.config_file,
            "[policy]\nthreshold_days = 14\ninclude_backups = true\n",
        )
        .expect("write config");

        let cfg = load_file_config(&paths).expect("load");
        assert_eq!(cfg.policy.threshold_days, 14);
        assert!(cfg.policy.include_backups);
        assert!(!cfg.policy.auto_run);
        assert_eq!(cfg.server.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn save_policy_keeps_other_sections() {
        let tmp = tempdir().expect("tempdir");
        let paths = temp_paths(tmp.path());
        fs::write(
            &paths.config_file,
            "[server]\nbase_url = \"http://tavern.lan:8000\"\ntimeout_secs = 5\n",
        )
        .expect("write config");

        let policy = ExpirationPolicy {
            threshold_days: 10,
            include_backups: true,
            auto_run: true,
        };
        save_policy(&paths, &policy).expect("save");

        let cfg = load_file_config(&paths).expect("reload");
        assert_eq!(cfg.policy, policy);
        assert_eq!(cfg.server.base_url, "http://tavern.lan:8000");
        assert_eq!(cfg.server.timeout_secs, 5);
    }

    #[test]
    fn validate_rejects_bad_timezone_and_normalizes_zero_days() {
        let mut cfg = ExpireConfig::default();
        cfg.policy.threshold_days = 0;
        validate(&mut cfg).expect("valid");
        assert_eq!(cfg.policy.threshold_days, DEFAULT_THRESHOLD_DAYS);

        cfg.host.timezone = "Mars/Olympus".to_string();
        assert!(validate(&mut cfg).is_err());
    }

    #[test]
    fn validate_requires_credentials_in_pairs() {
        let mut cfg = ExpireConfig::default();
        cfg.server.username = Some("alice".to_string());
        assert!(validate(&mut cfg).is_err());
    }
}
