//! MedScribe Gateway - signed-request verification in front of MedScribe APIs.
//!
//! # Usage
//!
//! ```text
//! MEDSCRIBE_SIGNING_SECRET=... GATEWAY_LISTEN=0.0.0.0:8787 medscribe-gateway
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8787` | Bind address |
//! | `MEDSCRIBE_SIGNING_SECRET` | *(required unless signature check is off)* | Shared HMAC secret |
//! | `MEDSCRIBE_MAX_SKEW_MS` | `300000` | Allowed clock skew |
//! | `MEDSCRIBE_RATE_LIMIT_WINDOW_MS` | `60000` | Rate-limit window |
//! | `MEDSCRIBE_RATE_LIMIT_MAX` | `100` | Requests per window per key |
//! | `MEDSCRIBE_MIN_API_KEY_LEN` | `20` | Minimum API key length |
//! | `MEDSCRIBE_VERIFY_SIGNATURE` | `true` | Enforce `x-signature` |
//! | `MEDSCRIBE_STORE_FAILURE_POLICY` | `fail-closed` | `fail-closed` or `fail-open` |
//! | `MEDSCRIBE_STORE_TIMEOUT_MS` | `250` | Bound on one store call |
//! | `MEDSCRIBE_SWEEP_INTERVAL_MS` | `60000` | Expired-entry purge interval |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use medscribe_core::{Clock, GuardConfig, SystemClock};
use medscribe_gateway::{EchoHandler, GatewayService, MemoryStores, VERSION, serve, spawn_sweeper};
use medscribe_http::service::GuardedHttpService;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` takes precedence over `log_level`.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(&directives)
            .with_context(|| format!("RUST_LOG is not a valid filter: {directives}"))?,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("LOG_LEVEL is not a valid filter: {log_level}"))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// How long `--health-check` waits for the gateway to answer.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Ask a running gateway for `GET /health` and require `200` with `"status":"ok"`.
async fn probe_health(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let exchange = async {
        let mut stream = tokio::net::TcpStream::connect(addr)
            .await
            .with_context(|| format!("gateway not reachable at {addr}"))?;
        let request =
            format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        anyhow::Ok(raw)
    };
    let raw = tokio::time::timeout(PROBE_TIMEOUT, exchange)
        .await
        .with_context(|| format!("no answer from {addr} within {PROBE_TIMEOUT:?}"))??;

    let text = String::from_utf8_lossy(&raw);
    let (head, payload) = text
        .split_once("\r\n\r\n")
        .context("truncated health response")?;
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default();
    anyhow::ensure!(status == "200", "health probe returned status {status:?}");

    let report: serde_json::Value =
        serde_json::from_str(payload.trim()).context("health body is not JSON")?;
    anyhow::ensure!(report["status"] == "ok", "gateway reports {report}");
    Ok(())
}

/// Bind address from `GATEWAY_LISTEN`.
fn listen_addr_from_env() -> String {
    std::env::var("GATEWAY_LISTEN").unwrap_or_else(|_| "0.0.0.0:8787".to_owned())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c, stopping now");
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let listen_addr = listen_addr_from_env();

    // Container probes run the binary with `--health-check`.
    if std::env::args().skip(1).any(|arg| arg == "--health-check") {
        let target = listen_addr.replace("0.0.0.0", "127.0.0.1");
        return probe_health(&target).await;
    }

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    init_tracing(&log_level, json_logs)?;

    let config = GuardConfig::from_env().context("invalid guard configuration")?;
    info!(?config, "loaded guard configuration");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = MemoryStores::new(&config, &clock);
    let sweeper = spawn_sweeper(stores.clone(), config.sweep_interval());
    let verifier = Arc::new(stores.verifier(config, clock));

    let gateway = GatewayService::new(GuardedHttpService::new(Arc::new(EchoHandler), verifier));

    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("GATEWAY_LISTEN is not a socket address: {listen_addr}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;

    info!(%addr, version = VERSION, "starting MedScribe Gateway");

    let result = serve(listener, gateway, shutdown_signal()).await;
    sweeper.abort();
    result
}
