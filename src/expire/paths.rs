use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ExpirePaths {
    pub home: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
    pub lock_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ExpirePaths> {
    let home = match env::var("CHAT_EXPIRE_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".chat-expire"),
    };

    let config_file = env_or_default_path("CHAT_EXPIRE_CONFIG_PATH", home.join("config.toml"));
    let logs_dir = env_or_default_path("CHAT_EXPIRE_LOGS_DIR", home.join("logs"));
    let lock_file = logs_dir.join("expire-pass.lock");

    Ok(ExpirePaths {
        home,
        config_file,
        logs_dir,
        lock_file,
    })
}
