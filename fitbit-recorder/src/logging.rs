use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "fitbit-recorder.log";

/// Keeps the background log writer alive; drop it last so buffered lines are flushed.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    pub log_path: Option<PathBuf>,
}

/// Initialize tracing.
///
/// With `to_file`, logs go to `<config dir>/fitbit-recorder/logs/fitbit-recorder.log.YYYY-MM-DD`,
/// otherwise to stderr. `verbose` raises the level to debug; without it
/// `RUST_LOG` is honored and falls back to info.
pub fn init_logging(to_file: bool, verbose: bool) -> Result<LoggingGuard> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if !to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();

        return Ok(LoggingGuard {
            _guard: None,
            log_path: None,
        });
    }

    let logs_dir = logs_dir()?;
    std::fs::create_dir_all(&logs_dir)?;

    // One file per day; scheduled runs append to it
    let file_appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _guard: Some(guard),
        log_path: Some(logs_dir.join(LOG_FILE_PREFIX)),
    })
}

fn logs_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(anyhow::anyhow!("Could not find config directory"))?
        .join("fitbit-recorder");

    Ok(config_dir.join("logs"))
}
