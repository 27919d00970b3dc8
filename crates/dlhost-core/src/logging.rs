//! Logging init: file sink under the XDG state dir, stderr when the file is
//! unavailable.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dlhost=debug"))
}

/// Per-event writer handed out by the file sink. Falls back to stderr when
/// the file handle cannot be cloned.
enum LogWriter {
    File(fs::File),
    Stderr,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogSink(fs::File);

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogWriter::File)
            .unwrap_or(LogWriter::Stderr)
    }
}

fn open_log_file() -> Result<(fs::File, PathBuf)> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlhost")?;
    let log_dir = xdg_dirs.get_state_home().join("dlhost");
    fs::create_dir_all(&log_dir)?;
    let path = log_dir.join("dlhost.log");
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Initialize structured logging to `~/.local/state/dlhost/dlhost.log`.
/// When the state dir is unwritable, logging goes to stderr instead; the
/// host never refuses to start over a log file.
pub fn init_logging() -> Result<()> {
    match open_log_file() {
        Ok((file, path)) => {
            let writer = BoxMakeWriter::new(LogSink(file));
            tracing_subscriber::fmt()
                .with_env_filter(default_filter())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            tracing::info!("dlhost logging initialized at {}", path.display());
        }
        Err(e) => {
            init_logging_stderr();
            tracing::warn!("log file unavailable ({:#}), logging to stderr", e);
        }
    }
    Ok(())
}

/// Initialize logging to stderr only (no file).
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}
