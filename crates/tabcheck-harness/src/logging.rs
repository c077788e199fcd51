//! Structured logging for the harness binaries.
//!
//! Human-readable compact output goes to stderr, so that stdout stays free
//! for generated matrices. With `--log-json <PATH>` every event is also
//! written as one JSON object per line for post-hoc analysis with `jq`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Guard returned by [`init_logging`].
///
/// Keep it alive in `main()`; the JSON file is closed when the subscriber
/// is dropped at exit.
#[derive(Debug)]
pub struct LogGuard {
    /// JSON-lines log file, if one was requested.
    pub log_path: Option<PathBuf>,
}

/// `MakeWriter` over a shared file handle. Each event takes the lock for
/// the duration of one write.
#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            guard: self.file.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

struct SharedFileGuard<'a> {
    guard: MutexGuard<'a, File>,
}

impl io::Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut *self.guard, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut *self.guard)
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "trace" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// `verbose` lowers the default filter from `INFO` to `TRACE`; `RUST_LOG`
/// overrides either.
///
/// # Errors
///
/// Returns an I/O error if the JSON log file cannot be created or a global
/// subscriber is already installed.
pub fn init_logging(verbose: bool, json_path: Option<&Path>) -> io::Result<LogGuard> {
    let json_layer = match json_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(SharedFileWriter::new(file))
                    .with_target(true),
            )
        }
        None => None,
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(terminal_layer)
        .with(json_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LogGuard {
        log_path: json_path.map(Path::to_path_buf),
    })
}

/// Terminal-only logging for tests. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init();
}
