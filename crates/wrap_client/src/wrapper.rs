use crate::error::Result;
use crate::gas::GasTank;
use crate::Uri;

/// One named-method call: msgpack-encoded args plus an optional env blob.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub method: &'a str,
    pub args: &'a [u8],
    pub env: Option<&'a [u8]>,
}

impl<'a> Call<'a> {
    pub fn new(method: &'a str, args: &'a [u8]) -> Self {
        Self {
            method,
            args,
            env: None,
        }
    }

    pub fn with_env(mut self, env: &'a [u8]) -> Self {
        self.env = Some(env);
        self
    }
}

/// What an invoked unit calls back into (other units, the host bridge).
pub trait Invoker {
    fn invoke(&self, uri: &Uri, call: &Call<'_>) -> Result<Vec<u8>>;

    /// Gas budget of the enclosing invocation, if metered.
    fn gas(&self) -> Option<&GasTank> {
        None
    }
}

/// An invocable unit resolved from a [`Uri`].
pub trait Wrapper: Send + Sync {
    fn invoke(&self, invoker: &dyn Invoker, call: &Call<'_>) -> Result<Vec<u8>>;
}
