//! Tracing setup shared by the server and the CLI.
//!
//! Events go to stdout and to the log file named by [`Config::log_file`](crate::config::Config)
//! (`logs/docpipe.log` when unset). The file layer also records span close events, so every
//! `process_file` run leaves one line carrying its `run_id`, file name and busy/idle timings.
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, fmt::format::FmtSpan, prelude::*};

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "docpipe.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`). If the log file cannot be opened the error is
/// reported on stderr and only stdout logging is installed. Calling this twice is a no-op.
pub fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let path = log_file_path(log_file);
    let file_layer = match open_log_file(&path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}

fn log_file_path(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE))
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    #[test]
    fn unset_path_falls_back_to_logs_dir() {
        assert_eq!(log_file_path(None), Path::new("logs").join("docpipe.log"));
        assert_eq!(
            log_file_path(Some(Path::new("/var/log/docpipe.log"))),
            Path::new("/var/log/docpipe.log")
        );
    }

    #[test]
    fn log_file_is_appended_with_parents_created() {
        let dir = std::env::temp_dir().join(format!("docpipe-logs-{}", Uuid::new_v4()));
        let path = dir.join("nested").join("run.log");

        writeln!(open_log_file(&path).expect("first open"), "one").expect("write");
        writeln!(open_log_file(&path).expect("second open"), "two").expect("write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "one\ntwo\n");
        fs::remove_dir_all(dir).expect("cleanup");
    }
}
