//! Resolution strategies: content-addressed store units and named host units.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use wrap_store::{Checksum, CodeStore};

use crate::error::{InvokeError, Result};
use crate::uri::{HOST_AUTHORITY, STORE_AUTHORITY};
use crate::{Uri, Wrapper};

pub trait Resolver: Send + Sync {
    /// `Ok(None)` when this resolver does not serve `uri`.
    fn resolve(&self, uri: &Uri) -> Result<Option<Arc<dyn Wrapper>>>;
}

/// Turns stored bytecode into an invocable unit. This is the seam to the
/// external execution backend.
pub trait WrapLoader: Send + Sync {
    fn load(&self, checksum: &Checksum, code: &[u8]) -> Result<Arc<dyn Wrapper>>;
}

/// Named units registered up front, e.g. the host state bridge.
pub struct StaticResolver {
    authority: String,
    units: HashMap<String, Arc<dyn Wrapper>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::with_authority(HOST_AUTHORITY)
    }

    pub fn with_authority(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            units: HashMap::new(),
        }
    }

    pub fn register(mut self, name: impl Into<String>, unit: Arc<dyn Wrapper>) -> Self {
        self.units.insert(name.into(), unit);
        self
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, uri: &Uri) -> Result<Option<Arc<dyn Wrapper>>> {
        if uri.authority() != self.authority {
            return Ok(None);
        }
        Ok(self.units.get(uri.path()).cloned())
    }
}

/// Resolves `wrap://store/<hex>` through the code store and a loader.
/// Loaded units are cached per checksum.
pub struct StoreResolver {
    store: CodeStore,
    loader: Arc<dyn WrapLoader>,
    cache: Mutex<HashMap<Checksum, Arc<dyn Wrapper>>>,
}

impl StoreResolver {
    pub fn new(store: CodeStore, loader: Arc<dyn WrapLoader>) -> Self {
        Self {
            store,
            loader,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl Resolver for StoreResolver {
    fn resolve(&self, uri: &Uri) -> Result<Option<Arc<dyn Wrapper>>> {
        if uri.authority() != STORE_AUTHORITY {
            return Ok(None);
        }
        let checksum: Checksum = uri
            .path()
            .parse()
            .map_err(|e| InvokeError::Resolution(format!("{uri}: {e}")))?;

        if let Some(unit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&checksum)
        {
            return Ok(Some(Arc::clone(unit)));
        }

        let code = self.store.get_code(&checksum)?;
        let unit = self.loader.load(&checksum, &code)?;
        debug!(%checksum, size = code.len(), "loaded unit");
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(checksum, Arc::clone(&unit));
        Ok(Some(unit))
    }
}

/// Loader backed by natively implemented units keyed by checksum.
#[derive(Default)]
pub struct RegistryLoader {
    units: HashMap<Checksum, Arc<dyn Wrapper>>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, checksum: Checksum, unit: Arc<dyn Wrapper>) -> Self {
        self.units.insert(checksum, unit);
        self
    }

    /// Register `unit` as the implementation of `code`.
    pub fn register_code(self, code: &[u8], unit: Arc<dyn Wrapper>) -> Self {
        self.register(Checksum::of(code), unit)
    }
}

impl WrapLoader for RegistryLoader {
    fn load(&self, checksum: &Checksum, _code: &[u8]) -> Result<Arc<dyn Wrapper>> {
        self.units
            .get(checksum)
            .cloned()
            .ok_or_else(|| InvokeError::Resolution(format!("no unit registered for {checksum}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Call, Invoker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    impl Wrapper for Echo {
        fn invoke(&self, _invoker: &dyn Invoker, call: &Call<'_>) -> Result<Vec<u8>> {
            Ok(call.args.to_vec())
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl WrapLoader for CountingLoader {
        fn load(&self, _checksum: &Checksum, _code: &[u8]) -> Result<Arc<dyn Wrapper>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Echo))
        }
    }

    #[test]
    fn static_resolver_matches_authority_and_name() {
        let r = StaticResolver::new().register("echo", Arc::new(Echo));
        assert!(r.resolve(&Uri::host("echo")).unwrap().is_some());
        assert!(r.resolve(&Uri::host("other")).unwrap().is_none());
        assert!(r.resolve(&"wrap://elsewhere/echo".parse::<Uri>().unwrap()).unwrap().is_none());
    }

    #[test]
    fn store_resolver_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        let c = store.create(b"unit").unwrap();
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
        });
        let r = StoreResolver::new(store, loader.clone());
        assert!(r.resolve(&Uri::store(&c)).unwrap().is_some());
        assert!(r.resolve(&Uri::store(&c)).unwrap().is_some());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn store_resolver_missing_code() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        let r = StoreResolver::new(store, Arc::new(RegistryLoader::new()));
        let err = r.resolve(&Uri::store(&Checksum::of(b"nope"))).err().unwrap();
        assert!(matches!(err, InvokeError::Store(wrap_store::StoreError::NotFound(_))));
    }

    #[test]
    fn store_resolver_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        let r = StoreResolver::new(store, Arc::new(RegistryLoader::new()));
        let uri: Uri = "wrap://store/not-hex".parse().unwrap();
        assert!(matches!(r.resolve(&uri), Err(InvokeError::Resolution(_))));
    }

    #[test]
    fn registry_loader_unknown_checksum() {
        let loader = RegistryLoader::new().register_code(b"known", Arc::new(Echo));
        assert!(loader.load(&Checksum::of(b"known"), b"known").is_ok());
        assert!(matches!(
            loader.load(&Checksum::of(b"other"), b"other"),
            Err(InvokeError::Resolution(_))
        ));
    }
}
