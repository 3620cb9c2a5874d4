//! MedScribe gateway: verifies signed requests before they reach a handler.
//!
//! The binary in `main.rs` wires these pieces from the environment; they are
//! exposed as a library so tests can run the same server in-process.

pub mod gateway;
pub mod handler;
pub mod server;

pub use gateway::GatewayService;
pub use handler::{CallerSummary, EchoHandler};
pub use server::{MemoryStores, serve, spawn_sweeper};

/// Gateway version reported by health probes.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
