//! CLI argument validation functions
//!
//! Value parsers for arguments clap cannot check on its own.

use std::fs;
use std::path::PathBuf;

/// Upper bound on workers in one process.
const MAX_CONCURRENCY: usize = 256;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Validate worker concurrency is between 1 and 256
pub fn validate_concurrency(value: &str) -> Result<usize, String> {
    let concurrency: usize = value
        .parse()
        .map_err(|_| format!("Concurrency must be a positive number, got: '{}'", value))?;

    if concurrency == 0 {
        return Err("Concurrency must be at least 1".to_string());
    }

    if concurrency > MAX_CONCURRENCY {
        return Err(format!("Concurrency cannot exceed {}", MAX_CONCURRENCY));
    }

    Ok(concurrency)
}
