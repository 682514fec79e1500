use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Empty query or empty chunk text; never touches the index.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding backend unreachable, timed out or returned unusable vectors.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Generation backend unreachable, timed out or returned nothing.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Snapshot read/write failure.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        Error::Embedding(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        Error::Generation(err.to_string())
    }

    pub fn persistence<E: std::fmt::Display>(err: E) -> Self {
        Error::Persistence(err.to_string())
    }

    /// True for failures of the embedding/generation/storage backends, as
    /// opposed to caller mistakes.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_) | Error::Generation(_) | Error::Persistence(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
