use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const MEMORY_TRACKING_VAR: &str = "TEN_ENABLE_MEMORY_TRACKING";
const INTENTIONAL_LEAK_VAR: &str = "TEN_ENABLE_INTENTIONAL_MEMORY_LEAK";

/// Exit code reported when the leak tracker finds the intentional leak
const LEAK_EXIT_CODE: i32 = 123;

/// Controllable HTTP service for leakcheck e2e tests
#[derive(Parser, Debug)]
#[command(name = "testsubject")]
#[command(about = "Controllable HTTP subject for leakcheck e2e tests", long_about = None)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value = "8002")]
    port: u16,

    /// Exit code on shutdown when the leak tracker has nothing to report
    #[arg(long, default_value = "0")]
    exit_code: i32,

    /// Milliseconds to wait before opening the port
    #[arg(long, default_value = "0")]
    startup_delay_ms: u64,

    /// Never open the port
    #[arg(long)]
    never_listen: bool,

    /// Ignore close_app requests and SIGTERM
    #[arg(long)]
    ignore_stop: bool,

    /// Status returned for every request other than close_app
    #[arg(long, default_value = "200")]
    probe_status: u16,

    /// Milliseconds to keep running after the port is closed
    #[arg(long, default_value = "0")]
    linger_ms: u64,

    /// Append one line per non-control request to this file
    #[arg(long)]
    request_log: Option<PathBuf>,
}

/// Leak tracker switches read from the environment.
#[derive(Debug, Clone, Copy)]
struct LeakTracking {
    memory_tracking: bool,
    intentional_leak: bool,
}

impl LeakTracking {
    fn from_env() -> Self {
        let enabled = |name: &str| std::env::var(name).map_or(false, |v| v == "true");
        Self {
            memory_tracking: enabled(MEMORY_TRACKING_VAR),
            intentional_leak: enabled(INTENTIONAL_LEAK_VAR),
        }
    }
}

/// Per-request behavior shared by all connections.
struct Behavior {
    probe_status: StatusCode,
    ignore_stop: bool,
    request_log: Option<PathBuf>,
    stop: mpsc::UnboundedSender<&'static str>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let tracking = LeakTracking::from_env();
    info!("Starting testsubject with args: {:?}, {:?}", args, tracking);

    let probe_status = match StatusCode::from_u16(args.probe_status) {
        Ok(status) => status,
        Err(e) => {
            error!("Invalid --probe-status {}: {}", args.probe_status, e);
            std::process::exit(2);
        }
    };

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    spawn_signal_handler(stop_tx.clone(), args.ignore_stop);

    if args.startup_delay_ms > 0 {
        info!("Startup delay: waiting {}ms", args.startup_delay_ms);
        sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    if args.never_listen {
        info!("Not opening a port as requested");
        let reason = stop_rx.recv().await.unwrap_or("channel closed");
        info!("Stopping: {}", reason);
        std::process::exit(finish(&args, tracking));
    }

    let addr = format!("{}:{}", args.host, args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on http://{}", addr);

    let behavior = Arc::new(Behavior {
        probe_status,
        ignore_stop: args.ignore_stop,
        request_log: args.request_log.clone(),
        stop: stop_tx,
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let behavior = behavior.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(req, behavior.clone()));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("Connection closed with error: {}", e);
                    }
                });
            }
            reason = stop_rx.recv() => {
                info!("Stopping: {}", reason.unwrap_or("channel closed"));
                break;
            }
        }
    }

    drop(listener);
    info!("Port closed");

    if args.linger_ms > 0 {
        info!("Lingering for {}ms", args.linger_ms);
        sleep(Duration::from_millis(args.linger_ms)).await;
    }

    std::process::exit(finish(&args, tracking));
}

async fn handle(
    req: Request<Incoming>,
    behavior: Arc<Behavior>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let body = req.into_body().collect().await?.to_bytes();
    let message: Option<serde_json::Value> = serde_json::from_slice(&body).ok();

    let is_close_app = message
        .as_ref()
        .and_then(|m| m.pointer("/ten/type"))
        .and_then(|t| t.as_str())
        == Some("close_app");

    if is_close_app {
        if behavior.ignore_stop {
            info!("Ignoring close_app request");
        } else {
            info!("Received close_app request");
            let _ = behavior.stop.send("close_app request");
        }
        return Ok(respond(StatusCode::OK, "closing\n"));
    }

    info!("{} {} -> {}", method, path, behavior.probe_status);
    if let Some(ref log) = behavior.request_log {
        if let Err(e) = append_request(log, method.as_str(), &path, &body) {
            warn!("Failed to record request in {}: {}", log.display(), e);
        }
    }

    Ok(respond(behavior.probe_status, "ok\n"))
}

fn respond(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

fn append_request(path: &Path, method: &str, uri_path: &str, body: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{} {} {}", method, uri_path, String::from_utf8_lossy(body))
}

/// Run the leak tracker and pick the exit code.
fn finish(args: &Args, tracking: LeakTracking) -> i32 {
    if tracking.memory_tracking && tracking.intentional_leak {
        let leaked: &'static mut [u8] = Box::leak(vec![0u8; 4096].into_boxed_slice());
        leaked[0] = 1;
        warn!(
            "Leak tracker: {} bytes allocated on the intentional-leak path were never freed",
            leaked.len()
        );
        return LEAK_EXIT_CODE;
    }

    info!("Testsubject stopped");
    args.exit_code
}

fn spawn_signal_handler(stop: mpsc::UnboundedSender<&'static str>, ignore_stop: bool) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to setup SIGTERM handler: {}", e);
                    return;
                }
            };

            while sigterm.recv().await.is_some() {
                if ignore_stop {
                    info!("Ignoring SIGTERM");
                    continue;
                }
                let _ = stop.send("SIGTERM");
                return;
            }
        }

        #[cfg(windows)]
        {
            while tokio::signal::ctrl_c().await.is_ok() {
                if ignore_stop {
                    info!("Ignoring Ctrl+C");
                    continue;
                }
                let _ = stop.send("Ctrl+C");
                return;
            }
        }
    });
}
