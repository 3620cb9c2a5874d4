//! HTTP service layer for the MedScribe request guard.
//!
//! - **Signable bodies**: decodes the wire body by `content-type` into the form
//!   the signature covers
//! - **Handler trait**: the boundary between the guard and business logic
//! - **Service**: hyper `Service` that verifies, then dispatches
//! - **Response helpers**: JSON success and error formatting

pub mod body;
pub mod dispatch;
pub mod error;
pub mod multipart;
pub mod response;
pub mod service;
pub mod signable;

pub use body::GuardResponseBody;
pub use dispatch::{GuardedHandler, HandlerFuture, RequestId};
pub use error::GuardHttpError;
pub use service::GuardedHttpService;
