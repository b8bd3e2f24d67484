//! # leakcheck process
//!
//! Everything that touches the subject at the OS level:
//! - Environment composition (leak-tracking flags, sanitizer preload)
//! - Platform resolution of binary paths and preload variables
//! - Launching, force-killing and reaping the subject
//! - Cooperative termination by signal

pub mod environment;
pub mod platform;
pub mod supervisor;
pub mod terminate;
pub mod validation;

// Re-export main types
pub use environment::{
    base_environment, compose_environment, Environment, LeakCheckFlags, INTENTIONAL_LEAK_VAR,
    MEMORY_TRACKING_VAR,
};
pub use platform::{resolve_binary_path, resolve_preload_env, Platform};
pub use supervisor::{exit_code_from_status, LaunchSpec, ProcessSupervisor, ServiceProcess};
pub use terminate::request_termination;
pub use validation::{validate_executable, validate_working_directory};
