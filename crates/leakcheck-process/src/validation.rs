//! Pre-launch validation.
//!
//! Checked before spawning so a missing build artifact is reported as such
//! rather than as an opaque OS error.

use leakcheck_common::{LaunchError, LaunchResult};
use std::path::Path;

/// Validate that the executable exists and is a regular file.
///
/// Bare program names (no directory component) are resolved through `PATH`
/// at spawn time and are not checked here.
pub fn validate_executable(path: &Path) -> LaunchResult<()> {
    if path.as_os_str().is_empty() {
        return Err(LaunchError::executable_missing(path));
    }

    if path.components().count() == 1 && !path.is_absolute() {
        return Ok(());
    }

    if !path.exists() {
        return Err(LaunchError::executable_missing(path));
    }

    if !path.is_file() {
        return Err(LaunchError::not_a_file(path));
    }

    Ok(())
}

/// Validate that the working directory exists.
pub fn validate_working_directory(path: &Path) -> LaunchResult<()> {
    if !path.is_dir() {
        return Err(LaunchError::working_directory_missing(path));
    }
    Ok(())
}
