//! # KISS Link Responder
//!
//! Serves a KISS link on a serial port: answers pings, stores parameters sent
//! by the peer, answers parameter requests and records link control updates.
//!
//! Usage: `kiss-link [config.toml]`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use kiss_link::config::{Config, LoggingConfig};
use kiss_link::error::KissError;
use kiss_link::kiss::Link;
use kiss_link::responder::Responder;
use kiss_link::serial::SerialTransport;

/// Initialize logging to stdout and, if configured, a daily log file
///
/// `RUST_LOG` overrides the configured level. The returned guard must be
/// held for the life of the program or buffered file output is lost.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "kiss-link.log");
            let (file, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_ansi(false)
                .with_writer(std::io::stdout.and(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
            Ok(Some(guard))
        }
        None => {
            builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
            Ok(None)
        }
    }
}

/// Serve the link until `running` is cleared
///
/// Runs on a blocking thread: the link and its serial transport are synchronous.
fn run_responder(config: &Config, running: &AtomicBool) -> Result<()> {
    let transport = SerialTransport::open(
        &config.serial.port,
        config.serial.baud_rate,
        config.serial_timeout(),
    )?;
    info!("Serving KISS link on {}", transport.device_path());

    let mut buffer = vec![0u8; config.link.buffer_size];
    let mut link = Link::new(&mut buffer, transport, config.link_options())?;
    let mut responder = Responder::new(config.link.buffer_size, config.link.max_attempts);

    while running.load(Ordering::Relaxed) {
        match responder.poll(&mut link) {
            Ok(_) => {}
            Err(e @ KissError::Io(_)) | Err(e @ KissError::Serial(_)) => {
                return Err(e).context("serial link failed");
            }
            Err(e) => warn!("Dropped frame: {}", e),
        }
    }

    info!("Frames handled: {}", responder.frames());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("failed to load config {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging)?;

    info!("KISS Link v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Link: buffer {} bytes, CRC32 {}, padding {}, TX delay {}",
        config.link.buffer_size, config.link.crc32, config.link.padding, config.link.tx_delay
    );

    let running = Arc::new(AtomicBool::new(true));
    let mut worker = tokio::task::spawn_blocking({
        let config = config.clone();
        let running = Arc::clone(&running);
        move || run_responder(&config, &running)
    });

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = &mut worker => {
            return result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl+C, shutting down...");
            running.store(false, Ordering::Relaxed);
        }
    }

    worker.await?
}
