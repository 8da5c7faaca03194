use thiserror::Error;

use crate::Checksum;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("code not found: {0}")]
    NotFound(Checksum),

    #[error("manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
