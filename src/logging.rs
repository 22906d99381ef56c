use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "chat_expire=info";

/// Installs the stderr subscriber. Level comes from `CHAT_EXPIRE_LOG`.
pub fn init() {
    let filter = EnvFilter::try_from_env("CHAT_EXPIRE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
