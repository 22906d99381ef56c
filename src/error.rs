use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExpireError {
    #[error("{operation} failed: HTTP {status}")]
    Transport { operation: &'static str, status: u16 },
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("another expiration pass is already running (lock held on {0})")]
    PassLocked(String),
}

impl ExpireError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "E001_TRANSPORT",
            Self::InvalidConfig(_) => "E002_CONFIG_INVALID",
            Self::PassLocked(_) => "E003_PASS_LOCKED",
        }
    }
}
