use color_eyre::Result;
use std::{fs::create_dir_all, path::PathBuf};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_NAME: &str = "tg-video-relay";

/// Log to stdout and to a file under `.logs/`.
///
/// Keep the returned guard alive for the lifetime of the process so buffered
/// file output gets flushed.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn setup_logger() -> Result<WorkerGuard> {
    let log_dir_path = PathBuf::from(".logs");
    create_dir_all(&log_dir_path)?;

    let logfile = if cfg!(debug_assertions) {
        rolling::daily(log_dir_path, format!("{LOG_NAME}.log"))
    } else {
        rolling::never(log_dir_path, format!("{LOG_NAME}.log"))
    };
    let (writer, guard) = tracing_appender::non_blocking(logfile);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    #[cfg(feature = "bunyan")]
    {
        use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
        registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(LOG_NAME.into(), writer))
            .try_init()?;
    }

    #[cfg(not(feature = "bunyan"))]
    {
        registry
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()?;
    }

    Ok(guard)
}
