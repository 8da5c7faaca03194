use thiserror::Error;
use wrap_client::InvokeError;
use wrap_store::StoreError;

#[derive(Error, Debug)]
pub enum VmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("guest invocation: {0}")]
    GuestInvocation(String),
    #[error("insufficient gas: {0}")]
    InsufficientGas(String),
    #[error("host state is not bound")]
    ScopeUnbound,
    #[error("host state is already bound to another call")]
    AlreadyBound,
}

pub type Result<T> = std::result::Result<T, VmError>;

/// A failed instantiate/execute together with the gas it consumed.
#[derive(Error, Debug)]
#[error("{error} (gas used: {gas_used})")]
pub struct ExecutionError {
    #[source]
    pub error: VmError,
    pub gas_used: u64,
}

impl From<StoreError> for VmError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidInput(m) => VmError::InvalidInput(m),
            StoreError::NotFound(c) => VmError::NotFound(format!("code {c}")),
            other => VmError::StorageFailure(other),
        }
    }
}

impl From<InvokeError> for VmError {
    fn from(e: InvokeError) -> Self {
        match e {
            InvokeError::UnknownMethod(m) => VmError::UnknownMethod(m),
            InvokeError::Guest(m) => VmError::GuestInvocation(m),
            InvokeError::Serialization(m) => VmError::Serialization(m),
            InvokeError::Resolution(m) => VmError::NotFound(m),
            InvokeError::Unresolved(uri) => VmError::NotFound(uri.to_string()),
            InvokeError::Unbound => VmError::ScopeUnbound,
            e @ InvokeError::OutOfGas { .. } => VmError::InsufficientGas(e.to_string()),
            InvokeError::Store(e) => e.into(),
        }
    }
}
