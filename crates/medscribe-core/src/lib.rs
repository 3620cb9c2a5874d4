//! Core types, configuration, and keyed state for the MedScribe request guard.
//!
//! This crate provides the building blocks shared by the signer, the verifier,
//! and the HTTP layer: environment-driven configuration, a wall clock that can
//! be replaced in tests, and a concurrent store of entries that expire on an
//! epoch-millisecond deadline.

mod clock;
mod config;
mod error;
mod state;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GuardConfig, StoreFailurePolicy};
pub use error::{CoreError, CoreResult};
pub use state::{Expiring, ExpiringStore};
pub use types::{ApiKey, EpochMillis, RateKey};
