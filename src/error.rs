use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad generator or run parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input tables that cannot be turned into a distribution.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A raw value fell outside every interval. This is a bug in interval
    /// construction and is never recoverable.
    #[error("logic error: {0}")]
    Logic(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(description: impl Into<String>) -> Self {
        Error::Configuration(description.into())
    }

    pub fn invalid_input(description: impl Into<String>) -> Self {
        Error::InvalidInput(description.into())
    }

    pub fn logic(description: impl Into<String>) -> Self {
        Error::Logic(description.into())
    }
}
