//! File sink for the fmt layers

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use super::config::FileConfig;
use super::error::LoggerError;

/// Opens the configured log file, creating its parent directory when missing.
///
/// `Mutex<File>` implements `MakeWriter`, so the result plugs straight into a fmt layer.
pub(crate) fn open_log_file(config: &FileConfig) -> Result<Mutex<File>, LoggerError> {
    if config.path.as_os_str().is_empty() {
        return Err(LoggerError::config("log file path is empty"));
    }

    if let Some(parent) = config.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(config.append)
        .truncate(!config.append)
        .open(&config.path)?;

    Ok(Mutex::new(file))
}
