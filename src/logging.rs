//! Logging configuration.
//!
//! Sets up tracing-based logging to stderr, to systemd's journal on Linux, or to
//! a daily rolling file.
//!
//! Log level is controlled via the `FRAMEFINDER_LOG` environment variable
//! (`debug`, `info`, `warn`, `error`; default `info`).

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    /// Falls back to stderr when journald is unavailable or not on Linux.
    Journald,
    File(PathBuf),
}

pub fn init(target: LogTarget) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("FRAMEFINDER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Journald => {
            #[cfg(target_os = "linux")]
            {
                if let Ok(journald_layer) = tracing_journald::layer() {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(journald_layer)
                        .try_init()?;

                    tracing::info!("Logging initialized with journald backend");
                    return Ok(());
                }
            }

            init_stderr(env_filter)
        }
        LogTarget::File(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = tracing_appender::rolling::daily(&log_dir, "framefinder.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // The worker stops flushing once the guard drops.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init()?;

            tracing::info!("Logging initialized with file backend at {:?}", log_dir);
            Ok(())
        }
        LogTarget::Stderr => init_stderr(env_filter),
    }
}

fn init_stderr(env_filter: EnvFilter) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}
