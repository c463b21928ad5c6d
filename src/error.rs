use thiserror::Error;

/// Errors produced by this crate
#[derive(Debug, Error)]
pub enum Error {
    /// A caller supplied a value outside the accepted domain, e.g. an action index past the end of the action set
    #[error("Invalid value for `{name}`: {message}")]
    InvalidArgument { name: &'static str, message: String },

    #[error("No actions available to choose from")]
    EmptyActionSpace,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Policy encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
