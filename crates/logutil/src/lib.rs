//! Utilities for logging.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Output format for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global subscriber.
///
/// `RUST_LOG` overrides the default level. Returns false if a global
/// subscriber was already set.
pub fn init(default_level: Level, format: LogFormat) -> bool {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()).is_ok(),
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
        }
    }
}

/// Install a subscriber writing to the test harness' captured output.
///
/// Safe to call from every test, only the first call installs anything.
pub fn init_test() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::DEBUG.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_test_writer()
        .with_env_filter(env_filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
