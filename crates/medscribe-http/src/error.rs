//! Errors surfaced by the guarded HTTP service.

use medscribe_auth::error::VerifyError;

/// Why a request did not reach, or did not survive, the handler.
#[derive(Debug, thiserror::Error)]
pub enum GuardHttpError {
    /// The verifier rejected the request.
    #[error(transparent)]
    Rejected(#[from] VerifyError),

    /// The request body could not be read from the connection.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The handler failed after the request was accepted.
    #[error("{0}")]
    Handler(String),
}

impl GuardHttpError {
    /// HTTP status to answer with.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::Rejected(err) => err.code().status_code(),
            Self::BodyRead(_) => http::StatusCode::BAD_REQUEST,
            Self::Handler(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Symbolic name carried in the `error` field of the JSON body.
    #[must_use]
    pub fn error_name(&self) -> &'static str {
        match self {
            Self::Rejected(err) => err.code().as_str(),
            Self::BodyRead(_) => "BAD_REQUEST",
            Self::Handler(_) => "INTERNAL_ERROR",
        }
    }
}
