//! Platform-specific binary naming and library preloading.
//!
//! The three OS families differ in exactly two ways that matter to the
//! harness: whether executables carry an `.exe` suffix, and how a sanitizer
//! runtime is injected into the subject. Everything else in the supervisor is
//! platform-agnostic.

use crate::environment::Environment;
use std::fmt;
use std::path::{Path, PathBuf};

/// OS family of the machine running the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux and other ELF systems using `LD_PRELOAD`.
    Linux,
    /// macOS, using `DYLD_INSERT_LIBRARIES`.
    MacOs,
    /// Windows, where DLLs are found through `PATH`.
    Windows,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn executable_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Linux | Platform::MacOs => "",
        }
    }

    /// Separator used between entries of `PATH`-like variables.
    pub fn path_list_separator(&self) -> char {
        match self {
            Platform::Windows => ';',
            Platform::Linux | Platform::MacOs => ':',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "mac",
            Platform::Windows => "win",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve the subject executable for `platform`.
///
/// Relative paths are joined onto `root`. On Windows an `.exe` suffix is
/// appended when the path has no extension.
pub fn resolve_binary_path(root: &Path, binary: &Path, platform: Platform) -> PathBuf {
    let mut path = if binary.is_absolute() {
        binary.to_path_buf()
    } else {
        root.join(binary)
    };

    if platform == Platform::Windows && path.extension().is_none() {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(platform.executable_suffix());
        path.set_file_name(name);
    }

    path
}

/// Compute the environment entry that injects `library` into the subject.
///
/// Returns `(key, value)`. On Windows the library directory is prepended to
/// the existing `PATH` (looked up case-insensitively in `base`), so the
/// returned key keeps the casing already present in the environment.
pub fn resolve_preload_env(
    platform: Platform,
    library: &Path,
    base: &Environment,
) -> Option<(String, String)> {
    match platform {
        Platform::Linux => Some((
            "LD_PRELOAD".to_string(),
            library.to_string_lossy().into_owned(),
        )),
        Platform::MacOs => Some((
            "DYLD_INSERT_LIBRARIES".to_string(),
            library.to_string_lossy().into_owned(),
        )),
        Platform::Windows => {
            let dir = library.parent()?.to_string_lossy().into_owned();
            if dir.is_empty() {
                return None;
            }

            let existing = base
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("PATH"));

            Some(match existing {
                Some((key, value)) if !value.is_empty() => (
                    key.clone(),
                    format!("{}{}{}", dir, platform.path_list_separator(), value),
                ),
                Some((key, _)) => (key.clone(), dir),
                None => ("PATH".to_string(), dir),
            })
        }
    }
}
