//! Client-side request signing.
//!
//! [`RequestSigner`] holds a caller's credentials and stamps the guard headers
//! onto outgoing requests:
//!
//! ```text
//! api-key:        <caller key>
//! x-client-agent: Portal/2.14.0 (web)
//! x-timestamp:    1718000000000
//! x-path:         /reports?draft=1
//! x-signature:    sha256=<hex HMAC of the canonical string>
//! x-nonce:        <uuid v4>          (optional)
//! ```

use std::fmt;

use http::{HeaderMap, HeaderName, HeaderValue};
use medscribe_core::{ApiKey, EpochMillis};
use tracing::{debug, warn};

use crate::body::SignableBody;
use crate::canonical::{self, SIGNATURE_PREFIX};
use crate::headers;
use crate::user_agent::ClientAgent;

/// Signs outgoing requests on behalf of one caller.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: ApiKey,
    agent: ClientAgent,
    secret: Vec<u8>,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .field("agent", &self.agent)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    /// Create a signer for `api_key` identifying as `agent`.
    pub fn new(api_key: ApiKey, agent: ClientAgent, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            api_key,
            agent,
            secret: secret.into(),
        }
    }

    /// The caller key this signer stamps.
    #[must_use]
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// The agent this signer identifies as.
    #[must_use]
    pub fn agent(&self) -> &ClientAgent {
        &self.agent
    }

    /// Compute the hex signature for a request. No `sha256=` prefix.
    #[must_use]
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        body: &SignableBody,
        timestamp: EpochMillis,
    ) -> String {
        canonical::sign_request(&self.secret, method, path, body, &timestamp.to_string())
    }

    /// Build the full set of guard headers for a request.
    ///
    /// `path` must be the path and query exactly as the server will see it.
    #[must_use]
    pub fn signed_headers(
        &self,
        method: &str,
        path: &str,
        body: &SignableBody,
        timestamp: EpochMillis,
        nonce: Option<&str>,
    ) -> HeaderMap {
        let signature = self.sign_request(method, path, body, timestamp);
        debug!(
            method,
            path,
            timestamp,
            api_key = %self.api_key,
            "signed request"
        );

        let mut map = HeaderMap::new();
        insert(&mut map, headers::API_KEY, self.api_key.as_str());
        insert(&mut map, headers::CLIENT_AGENT, &self.agent.to_string());
        insert(&mut map, headers::TIMESTAMP, &timestamp.to_string());
        insert(&mut map, headers::PATH, path);
        insert(
            &mut map,
            headers::SIGNATURE,
            &format!("{SIGNATURE_PREFIX}{signature}"),
        );
        if let Some(nonce) = nonce {
            insert(&mut map, headers::NONCE, nonce);
        }
        map
    }

    /// Stamp guard headers onto an `http::Request`.
    ///
    /// The method and path-and-query are read from the request itself, so the
    /// signed path always matches what is sent.
    pub fn sign<B>(
        &self,
        request: &mut http::Request<B>,
        body: &SignableBody,
        timestamp: EpochMillis,
        nonce: Option<&str>,
    ) {
        let path = request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_owned(), ToString::to_string);
        let method = request.method().as_str().to_owned();
        let stamped = self.signed_headers(&method, &path, body, timestamp, nonce);
        request.headers_mut().extend(stamped);
    }
}

/// Generate a fresh random nonce.
#[must_use]
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn insert(map: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            map.insert(HeaderName::from_static(name), value);
        }
        Err(_) => warn!(header = name, "skipping header with non-visible characters"),
    }
}
