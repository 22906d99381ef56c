use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/chat_expire_env_allowlist.rs"));

const ENV_PREFIX: &str = "CHAT_EXPIRE_";

fn fallback_dotenv_path(app_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(app_home) = app_home {
        return Some(app_home.join(".env"));
    }
    Some(home_dir?.join(".chat-expire/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("CHAT_EXPIRE_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

fn unknown_keys_in<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = keys
        .into_iter()
        .filter(|key| key.starts_with(ENV_PREFIX))
        .filter(|key| !GENERATED_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}

/// `CHAT_EXPIRE_*` variables in the environment that no code path reads.
pub fn unknown_env_keys() -> Vec<String> {
    unknown_keys_in(env::vars_os().filter_map(|(k, _)| k.into_string().ok()))
}
