//! Environment composition for the subject process.
//!
//! The subject never inherits the harness environment implicitly. The caller
//! snapshots a base environment once, and [`compose_environment`] derives the
//! subject's environment from it without touching process-wide state, so
//! several harness runs can share one test binary.

use crate::platform::{resolve_preload_env, Platform};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Environment mapping handed to the subject. Ordered for stable logs.
pub type Environment = BTreeMap<String, String>;

/// Turns on the subject's internal memory tracker.
pub const MEMORY_TRACKING_VAR: &str = "TEN_ENABLE_MEMORY_TRACKING";

/// Makes the subject take its deliberately leaking code path.
pub const INTENTIONAL_LEAK_VAR: &str = "TEN_ENABLE_INTENTIONAL_MEMORY_LEAK";

const FLAG_ENABLED: &str = "true";

/// Test-specific switches layered on top of the base environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakCheckFlags {
    pub memory_tracking: bool,
    pub intentional_leak: bool,
    /// Sanitizer runtime to preload. The caller passes it only when the
    /// library actually exists on disk.
    pub sanitizer_library: Option<PathBuf>,
    /// Additional variables from the scenario configuration.
    pub extra: Environment,
}

/// Snapshot of the current process environment.
///
/// Variables whose names or values are not valid UTF-8 are skipped.
pub fn base_environment() -> Environment {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Merge `flags` into `base` for `platform`.
///
/// Later layers win: base, then scenario extras, then the sanitizer preload,
/// then the leak-tracking flags.
pub fn compose_environment(
    base: &Environment,
    platform: Platform,
    flags: &LeakCheckFlags,
) -> Environment {
    let mut env = base.clone();

    for (key, value) in &flags.extra {
        env.insert(key.clone(), value.clone());
    }

    if let Some(ref library) = flags.sanitizer_library {
        if let Some((key, value)) = resolve_preload_env(platform, library, &env) {
            debug!("Preloading sanitizer runtime via {}={}", key, value);
            env.insert(key, value);
        }
    }

    if flags.memory_tracking {
        env.insert(MEMORY_TRACKING_VAR.to_string(), FLAG_ENABLED.to_string());
    }

    if flags.intentional_leak {
        env.insert(INTENTIONAL_LEAK_VAR.to_string(), FLAG_ENABLED.to_string());
    }

    env
}
