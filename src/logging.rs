//! File logging under the selected workspace. Stdout carries the wire
//! protocol, so nothing may ever log there.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "apsconnectd";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

struct LoggingState {
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

static LOGGING: OnceCell<LoggingState> = OnceCell::new();

/// Idempotent init on first workspace selection. A later switch to another
/// workspace keeps logging to the first directory rather than re-initializing.
pub fn init(workspace: &Path) -> Result<(), String> {
    let log_dir = workspace.join("logs");
    if let Some(state) = LOGGING.get() {
        if state.log_dir != log_dir {
            log::info!(
                "workspace changed; logs remain in {}",
                state.log_dir.display()
            );
        }
        return Ok(());
    }

    std::fs::create_dir_all(&log_dir)
        .map_err(|e| format!("failed to create log directory {}: {e}", log_dir.display()))?;
    let logger = Logger::try_with_env_or_str("info")
        .map_err(|e| format!("invalid log level: {e}"))?
        .log_to_file(
            FileSpec::default()
                .directory(&log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .start()
        .map_err(|e| format!("failed to start logger: {e}"))?;
    let _ = LOGGING.set(LoggingState {
        log_dir,
        _logger: logger,
    });
    Ok(())
}
