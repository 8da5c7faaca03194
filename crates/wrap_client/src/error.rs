use thiserror::Error;
use wrap_store::StoreError;

use crate::Uri;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The invoked unit itself reported failure.
    #[error("guest: {0}")]
    Guest(String),

    #[error("serialization: {0}")]
    Serialization(String),

    #[error("resolution: {0}")]
    Resolution(String),

    #[error("no resolver for {0}")]
    Unresolved(Uri),

    #[error("host state is not bound")]
    Unbound,

    #[error("out of gas: needed {needed}, remaining {remaining}")]
    OutOfGas { needed: u64, remaining: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, InvokeError>;
