use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Status name used by gRPC adapters for this error kind.
    #[must_use]
    pub fn grpc_code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "InvalidArgument",
            Error::NotFound(_) => "NotFound",
            Error::Conflict(_) => "AlreadyExists",
            Error::Cancelled => "Cancelled",
            Error::Internal(_) | Error::Io(_) | Error::Config(_) => "Internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
