//! Errors for typed access.

use thiserror::Error as ThisError;

/// Errors from typed reads and writes.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    /// The underlying engine rejected the operation.
    #[error(transparent)]
    Core(#[from] pathstate_core::Error),

    /// A Rust value could not be turned into a store value.
    #[error("encode error: {message}")]
    Encode { message: String },

    /// A store value did not match the requested Rust type.
    #[error("decode error: {message}")]
    Decode { message: String },
}

impl Error {
    pub fn encode(message: impl Into<String>) -> Self {
        Error::Encode {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
        }
    }
}

impl From<Error> for pathstate_core::InitError {
    fn from(error: Error) -> Self {
        pathstate_core::InitError::new(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
