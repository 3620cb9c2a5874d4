//! Store wiring, background sweeping, and the accept loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use medscribe_auth::store::{FixedWindowRateLimiter, MemoryNonceStore};
use medscribe_auth::verifier::Verifier;
use medscribe_core::{Clock, GuardConfig};
use medscribe_http::dispatch::GuardedHandler;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::gateway::GatewayService;

/// The in-process nonce and rate-limit stores.
///
/// Both are shared with the verifier; the gateway keeps its own handles so it
/// can purge expired entries.
#[derive(Debug, Clone)]
pub struct MemoryStores {
    /// Nonces retained for twice the skew bound.
    pub nonces: Arc<MemoryNonceStore>,
    /// Per-caller fixed-window counters.
    pub limiter: Arc<FixedWindowRateLimiter>,
}

impl MemoryStores {
    /// Create stores sized from `config` and reading time from `clock`.
    #[must_use]
    pub fn new(config: &GuardConfig, clock: &Arc<dyn Clock>) -> Self {
        Self {
            nonces: Arc::new(MemoryNonceStore::with_clock(
                config.nonce_ttl_ms(),
                Arc::clone(clock),
            )),
            limiter: Arc::new(FixedWindowRateLimiter::with_clock(
                config.rate_limit_window_ms,
                config.rate_limit_max,
                Arc::clone(clock),
            )),
        }
    }

    /// Build a verifier over these stores.
    #[must_use]
    pub fn verifier(&self, config: GuardConfig, clock: Arc<dyn Clock>) -> Verifier {
        Verifier::new(config, self.nonces.clone(), self.limiter.clone()).with_clock(clock)
    }

    /// Drop expired nonces and finished windows.
    ///
    /// Returns how many nonces and buckets were removed.
    pub fn sweep(&self) -> (usize, usize) {
        (self.nonces.purge_expired(), self.limiter.purge_expired())
    }
}

/// Purge expired store entries every `period` until the task is aborted.
pub fn spawn_sweeper(stores: MemoryStores, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (nonces, buckets) = stores.sweep();
            debug!(
                nonces,
                buckets,
                live_nonces = stores.nonces.len(),
                live_buckets = stores.limiter.len(),
                "swept expired store entries"
            );
        }
    })
}

/// Run the accept loop until `shutdown` resolves, then drain connections.
pub async fn serve<H, F>(listener: TcpListener, service: GatewayService<H>, shutdown: F) -> Result<()>
where
    H: GuardedHandler,
    F: Future<Output = ()>,
{
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.with_peer(peer_addr.ip());
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained");

    Ok(())
}
