//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Assemble the subscriber stack from an explicit [`LoggingConfig`]
//! - Provide an in-memory writer for capturing output
//!
//! # Design Decisions
//! - Uses tracing crate as the logging facade
//! - Verbosity fixed once, when the subscriber is built
//! - The caller owns the subscriber; nothing here is a mutable global
//!   until [`init_logging`] is explicitly called

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::LoggingConfig;
use crate::observability::fields::LogFieldsLayer;
use crate::observability::format::LogLineFormat;

/// Build the full subscriber stack writing to `writer`.
pub fn build_subscriber<W>(config: &LoggingConfig, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(config.level_filter())
        .with(LogFieldsLayer)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(LogLineFormat::from_config(config))
                .with_writer(writer),
        )
}

/// Install the subscriber as the process default, writing to stdout.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    build_subscriber(config, io::stdout).try_init()?;
    tracing::info!("{}", config.level);
    Ok(())
}

/// Cloneable in-memory sink; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
