//! Tracing subscriber setup with redaction applied to every emitted line.

use crate::redaction::{has_secrets, redact};
use std::io::{self, Write};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Configuration for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Line format.
    pub format: TracingFormat,
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::default(),
            level: Level::WARN,
        }
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to initialise tracing: {0}")]
    Init(String),
}

/// Install the global tracing subscriber, writing to stderr through
/// [`RedactingMakeWriter`].
///
/// `RUST_LOG` takes precedence over `config.level` when present.
///
/// # Errors
///
/// Returns [`TracingError::Init`] if a global subscriber is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));
    let writer = RedactingMakeWriter::new(io::stderr);

    let result = match config.format {
        TracingFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .try_init(),
        TracingFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(writer)
            .try_init(),
    };
    result.map_err(|e| TracingError::Init(e.to_string()))
}

/// A [`MakeWriter`] wrapper whose writers pass output through [`redact`].
#[derive(Debug, Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
}

impl<M> RedactingMakeWriter<M> {
    /// Wrap an existing writer factory.
    pub const fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(self.inner.make_writer())
    }
}

/// Writer that masks registered secrets in each buffer it is given.
///
/// The fmt layer hands over one fully formatted event per `write` call, so
/// a secret is never split across two buffers.
#[derive(Debug)]
pub struct RedactingWriter<W> {
    inner: W,
}

impl<W> RedactingWriter<W> {
    /// Wrap a writer.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Return the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !has_secrets() {
            return self.inner.write(buf);
        }
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
