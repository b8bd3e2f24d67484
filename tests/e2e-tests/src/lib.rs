// E2E test framework for the leakcheck harness

pub mod assertions;

pub use scenario::{create_test_config, TestConfigOptions};
pub use test_executor::TestExecutor;

use std::env;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, Once};

/// Directory holding the workspace's compiled binaries.
fn binary_dir() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current exe path")
        .parent()
        .expect("Failed to get parent dir")
        .to_path_buf();

    // If we're in deps/, go up one level
    if path.ends_with("deps") {
        path.pop();
    }

    path
}

fn binary_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Locate a workspace binary, building its package once if it is missing.
fn locate_binary(name: &str, package: &str) -> PathBuf {
    static BUILD_LOCK: Mutex<()> = Mutex::new(());

    let path = binary_dir().join(binary_name(name));
    if path.exists() {
        return path;
    }

    let _guard = BUILD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if !path.exists() {
        println!("{} not found, building package {}...", name, package);
        let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
        let status = Command::new(cargo)
            .args(["build", "-p", package])
            .status()
            .expect("Failed to run cargo build");
        assert!(status.success(), "Building {} failed", package);
    }

    if !path.exists() {
        panic!("{} binary not found at: {}", name, path.display());
    }
    path
}

/// Get the path to the subject binary (testsubject)
pub fn get_testsubject_path() -> PathBuf {
    locate_binary("testsubject", "testsubject")
}

/// Get the path to the leakcheck CLI binary
pub fn get_leakcheck_path() -> PathBuf {
    locate_binary("leakcheck", "leakcheck")
}

/// Create a fresh test directory under target/tmp
pub fn create_test_dir(test_name: &str) -> PathBuf {
    let target_dir = binary_dir()
        .parent()
        .expect("Failed to get target dir")
        .to_path_buf();

    let temp_dir = target_dir
        .join("tmp")
        .join(format!("e2e-test-{}", test_name));

    if temp_dir.exists() {
        std::fs::remove_dir_all(&temp_dir).ok();
    }
    std::fs::create_dir_all(&temp_dir).expect("Failed to create test directory");
    temp_dir
}

/// Clean up test directory
pub fn cleanup_test_dir(dir: &Path) {
    if dir.exists() {
        std::fs::remove_dir_all(dir).ok();
    }
}

/// A localhost port nothing is listening on.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral port");
    listener
        .local_addr()
        .expect("Failed to read local address")
        .port()
}

/// Install a test log subscriber once per test binary. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}
