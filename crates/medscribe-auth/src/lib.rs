//! HMAC request signing and verification for MedScribe APIs.
//!
//! The signer and the verifier share one canonical form: the uppercase method,
//! the path and query, the `x-timestamp` text, and the SHA-256 of the
//! normalized body, joined by newlines and HMAC-SHA256'd with a shared secret.
//!
//! # Signing
//!
//! ```
//! use medscribe_auth::body::SignableBody;
//! use medscribe_auth::signer::RequestSigner;
//! use medscribe_auth::user_agent::{ClientAgent, Platform, Product};
//! use medscribe_core::ApiKey;
//!
//! let signer = RequestSigner::new(
//!     ApiKey::new("abcdefghijklmnopqrstuvwx"),
//!     ClientAgent::new(Product::Portal, "2.14.0", Platform::Web),
//!     "shared-secret",
//! );
//! let headers = signer.signed_headers("GET", "/reports", &SignableBody::Empty, 1_000, None);
//! assert!(headers["x-signature"].to_str().unwrap().starts_with("sha256="));
//! ```
//!
//! # Verifying
//!
//! [`verifier::Verifier`] runs the ordered checks and returns either a
//! [`verifier::VerifiedCaller`] or the first [`error::VerifyError`], whose
//! [`code`](error::VerifyError::code) is the stable numeric value clients
//! branch on.

pub mod body;
pub mod canonical;
pub mod error;
pub mod headers;
pub mod signer;
pub mod stable_json;
pub mod store;
pub mod user_agent;
pub mod verifier;

pub use body::{FormField, FormValue, SignableBody};
pub use error::{ErrorCategory, ErrorCode, StoreError, VerifyError};
pub use signer::{RequestSigner, generate_nonce};
pub use store::{FixedWindowRateLimiter, MemoryNonceStore, NonceStore, RateDecision, RateLimiter};
pub use user_agent::{ClientAgent, Platform, Product};
pub use verifier::{Check, RequestContext, VerifiedCaller, Verifier};
