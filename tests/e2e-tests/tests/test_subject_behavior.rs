//! Test Scenario 0.1: Subject Behavior
//!
//! Drives testsubject directly, without the harness, to pin down the
//! contract the harness relies on: close_app closes the port and the leak
//! tracker turns the intentional leak into exit code 123.

use e2e_tests::{free_port, get_testsubject_path, init_test_logging};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

const CLOSE_APP: &str = r#"{"ten":{"type":"close_app","dest":[{"app":"localhost"}]}}"#;

fn spawn_subject(port: u16, leak: bool) -> Child {
    let flag = if leak { "true" } else { "false" };
    Command::new(get_testsubject_path())
        .args(["--port", &port.to_string()])
        .env("TEN_ENABLE_MEMORY_TRACKING", "true")
        .env("TEN_ENABLE_INTENTIONAL_MEMORY_LEAK", flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn testsubject")
}

fn wait_for_port(port: u16, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        thread::sleep(Duration::from_millis(100));
    }
    false
}

fn send_close_app(port: u16) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("Failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("Failed to set read timeout");
    let request = format!(
        "POST / HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        port,
        CLOSE_APP.len(),
        CLOSE_APP
    );
    stream
        .write_all(request.as_bytes())
        .expect("Failed to send request");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    response
}

fn stop_and_collect(port: u16, leak: bool) -> Option<i32> {
    let mut child = spawn_subject(port, leak);
    assert!(
        wait_for_port(port, Duration::from_secs(10)),
        "testsubject did not open port {}",
        port
    );

    let response = send_close_app(port);
    println!("close_app response: {:?}", response.lines().next());
    assert!(response.starts_with("HTTP/1.1 200"), "Unexpected response: {}", response);

    match child
        .wait_timeout(Duration::from_secs(10))
        .expect("Failed to wait for testsubject")
    {
        Some(status) => status.code(),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            panic!("testsubject did not exit after close_app");
        }
    }
}

#[test]
fn test_close_app_with_intentional_leak() {
    println!("\n========================================");
    println!("TEST: Subject Reports Intentional Leak");
    println!("========================================\n");
    init_test_logging();

    let code = stop_and_collect(free_port(), true);
    assert_eq!(code, Some(123));

    println!("✓ TEST PASSED: Subject Reports Intentional Leak");
}

#[test]
fn test_close_app_without_leak() {
    println!("\n========================================");
    println!("TEST: Subject Exits Cleanly");
    println!("========================================\n");
    init_test_logging();

    let code = stop_and_collect(free_port(), false);
    assert_eq!(code, Some(0));

    println!("✓ TEST PASSED: Subject Exits Cleanly");
}
