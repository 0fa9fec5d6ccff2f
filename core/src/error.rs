//! Error taxonomy shared by every client style.
//!
//! # Design
//! Callers must be able to tell "the server answered with an error" from
//! "there was no answer" from "the answer could not be parsed". Status
//! failures are split by class and carry the raw status and body. Values are
//! `Clone` so a lazily described call can hand the same construction error to
//! every resolution.

/// Errors returned by the declarative client and both helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No response was received: unreachable host, refused connection,
    /// timeout, or a body that could not be read to the end.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server returned a 4xx status.
    #[error("client error {status}: {body}")]
    ClientError { status: u16, body: String },

    /// The server returned a 5xx status.
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    /// Any other non-2xx status the transport did not resolve on its own.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body does not match the expected shape.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The request could not be built. Raised before any network I/O.
    #[error("invalid request: {0}")]
    Construction(String),

    /// An asynchronous resolution was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Classify a non-2xx status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400..=499 => ApiError::ClientError { status, body },
            500..=599 => ApiError::ServerError { status, body },
            _ => ApiError::UnexpectedStatus { status, body },
        }
    }

    /// The HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ClientError { status, .. }
            | ApiError::ServerError { status, .. }
            | ApiError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
