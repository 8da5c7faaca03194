use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

use crate::error::{InvokeError, Result};
use crate::gas::GasTank;
use crate::resolver::Resolver;
use crate::{msgpack, Call, Invoker, Uri, Wrapper};

/// Resolves URIs through an ordered resolver chain and invokes the result.
#[derive(Clone, Default)]
pub struct Client {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl Client {
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// First resolver that serves `uri` wins.
    pub fn resolve(&self, uri: &Uri) -> Result<Arc<dyn Wrapper>> {
        for resolver in &self.resolvers {
            if let Some(unit) = resolver.resolve(uri)? {
                return Ok(unit);
            }
        }
        Err(InvokeError::Unresolved(uri.clone()))
    }

    /// Invoker that also exposes `gas` to every unit it reaches.
    pub fn metered<'a>(&'a self, gas: &'a GasTank) -> Metered<'a> {
        Metered { client: self, gas }
    }
}

impl Invoker for Client {
    fn invoke(&self, uri: &Uri, call: &Call<'_>) -> Result<Vec<u8>> {
        trace!(%uri, method = call.method, "invoke");
        self.resolve(uri)?.invoke(self, call)
    }
}

pub struct Metered<'a> {
    client: &'a Client,
    gas: &'a GasTank,
}

impl Invoker for Metered<'_> {
    fn invoke(&self, uri: &Uri, call: &Call<'_>) -> Result<Vec<u8>> {
        trace!(%uri, method = call.method, gas_used = self.gas.used(), "invoke");
        self.client.resolve(uri)?.invoke(self, call)
    }

    fn gas(&self) -> Option<&GasTank> {
        Some(self.gas)
    }
}

/// Typed call: msgpack-encode `args`, decode the result as `R`.
pub fn invoke<A, R>(invoker: &dyn Invoker, uri: &Uri, method: &str, args: &A) -> Result<R>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let args = msgpack::encode(args)?;
    let out = invoker.invoke(uri, &Call::new(method, &args))?;
    msgpack::decode(&out)
}
