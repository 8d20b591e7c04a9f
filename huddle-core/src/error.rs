use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) | Error::MemberNotFound(msg) => Self::not_found(msg),
            Error::InvalidInput(msg) => Self::invalid_argument(msg),
            Error::Unavailable(msg) => Self::unavailable(msg),
            Error::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                Self::internal(msg)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
