use std::fmt;
use std::str::FromStr;
use wrap_store::Checksum;

use crate::error::InvokeError;

pub const SCHEME: &str = "wrap";
/// Authority of content-addressed units in the code store.
pub const STORE_AUTHORITY: &str = "store";
/// Authority of statically registered host units.
pub const HOST_AUTHORITY: &str = "host";

/// Locator of an invocable unit: `wrap://<authority>/<path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    authority: String,
    path: String,
}

impl Uri {
    pub fn new(authority: impl Into<String>, path: impl Into<String>) -> Result<Self, InvokeError> {
        let authority = authority.into();
        let path = path.into();
        if authority.is_empty() || authority.contains('/') {
            return Err(InvokeError::Resolution(format!("invalid authority '{authority}'")));
        }
        if path.is_empty() {
            return Err(InvokeError::Resolution("empty uri path".into()));
        }
        Ok(Self { authority, path })
    }

    pub fn store(checksum: &Checksum) -> Self {
        Self {
            authority: STORE_AUTHORITY.into(),
            path: checksum.to_hex(),
        }
    }

    pub fn host(name: impl Into<String>) -> Self {
        Self {
            authority: HOST_AUTHORITY.into(),
            path: name.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for Uri {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| InvokeError::Resolution(format!("not a {SCHEME}:// uri: '{s}'")))?;
        let (authority, path) = rest
            .split_once('/')
            .ok_or_else(|| InvokeError::Resolution(format!("uri has no path: '{s}'")))?;
        Self::new(authority, path)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/{}", self.authority, self.path)
    }
}
