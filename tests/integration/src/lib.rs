//! End-to-end tests for the MedScribe gateway.
//!
//! Every test starts its own gateway on an ephemeral loopback port and talks
//! to it over real HTTP, so nothing external needs to be running:
//!
//! ```text
//! cargo test -p medscribe-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use medscribe_auth::{ClientAgent, Platform, Product, RequestSigner, SignableBody};
use medscribe_core::{ApiKey, Clock, EpochMillis, GuardConfig, SystemClock};
use medscribe_gateway::{EchoHandler, GatewayService, MemoryStores, serve};
use medscribe_http::GuardedHttpService;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Shared secret every test gateway is configured with.
pub const TEST_SECRET: &str = "integration-test-secret";

/// An API key long enough to pass the default length check.
pub const TEST_API_KEY: &str = "msk_test_0123456789abcdef";

/// Guard configuration with signing enabled under [`TEST_SECRET`].
#[must_use]
pub fn test_config() -> GuardConfig {
    GuardConfig {
        signing_secret: Some(TEST_SECRET.to_owned()),
        ..GuardConfig::default()
    }
}

/// A signer that the test gateway accepts.
#[must_use]
pub fn test_signer() -> RequestSigner {
    RequestSigner::new(
        ApiKey::new(TEST_API_KEY),
        ClientAgent::new(Product::Cli, "1.0.0", Platform::Cli),
        TEST_SECRET,
    )
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> EpochMillis {
    SystemClock.now_millis()
}

/// A gateway running in the background of the current test.
#[derive(Debug)]
pub struct TestGateway {
    addr: SocketAddr,
    client: reqwest::Client,
    stop: oneshot::Sender<()>,
    server: JoinHandle<anyhow::Result<()>>,
}

impl TestGateway {
    /// Bind a gateway with `config` on `127.0.0.1:0` and start serving.
    pub async fn start(config: GuardConfig) -> Self {
        init_tracing();

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let stores = MemoryStores::new(&config, &clock);
        let verifier = Arc::new(stores.verifier(config, clock));
        let gateway =
            GatewayService::new(GuardedHttpService::new(Arc::new(EchoHandler), verifier));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("failed to bind test listener: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("listener has no local address: {e}"));

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, gateway, async move {
            stopped.await.ok();
        }));

        Self {
            addr,
            client: reqwest::Client::new(),
            stop,
            server,
        }
    }

    /// Absolute URL for `path_and_query` on this gateway.
    #[must_use]
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }

    /// The HTTP client bound to this gateway.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Start a request carrying guard headers signed by `signer`.
    ///
    /// `body` is what the signature covers; the caller still attaches the
    /// bytes on the wire and their content type.
    #[must_use]
    pub fn signed(
        &self,
        signer: &RequestSigner,
        method: reqwest::Method,
        path_and_query: &str,
        body: &SignableBody,
        timestamp: EpochMillis,
        nonce: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let headers =
            signer.signed_headers(method.as_str(), path_and_query, body, timestamp, nonce);
        self.client
            .request(method, self.url(path_and_query))
            .headers(headers)
    }

    /// Stop accepting, drain open connections, and wait for the server task.
    pub async fn shutdown(self) {
        let Self {
            client,
            stop,
            server,
            ..
        } = self;
        drop(client);
        stop.send(()).ok();
        server
            .await
            .unwrap_or_else(|e| panic!("gateway task panicked: {e}"))
            .unwrap_or_else(|e| panic!("gateway failed: {e}"));
    }
}

/// Read a response body as JSON.
pub async fn json_body(resp: reqwest::Response) -> serde_json::Value {
    resp.json()
        .await
        .unwrap_or_else(|e| panic!("response body is not JSON: {e}"))
}

mod test_body;
mod test_health;
mod test_replay;
mod test_verify;
