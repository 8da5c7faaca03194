//! Content-addressed bytecode store.
//!
//! Every blob lives under its own directory keyed by the hex SHA-256 of its
//! bytes:
//!
//! ```text
//! <data_dir>/wasm/<hex checksum>/wrap.wasm   raw bytecode
//! <data_dir>/wasm/<hex checksum>/wrap.info   JSON manifest (may be empty)
//! ```
//!
//! Writes are idempotent: storing the same bytes twice yields the same
//! checksum and rewrites identical files. Entries are never deleted here.

pub mod analysis;
pub mod checksum;
pub mod error;

pub use analysis::AnalysisReport;
pub use checksum::Checksum;
pub use error::{Result, StoreError};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const WASM_DIR: &str = "wasm";
const CODE_FILE: &str = "wrap.wasm";
const MANIFEST_FILE: &str = "wrap.info";

pub const MANIFEST_VERSION: u32 = 1;

/// Metadata written next to each stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub checksum: Checksum,
    pub size: u64,
    pub report: AnalysisReport,
}

#[derive(Debug, Clone)]
pub struct CodeStore {
    root: PathBuf,
}

impl CodeStore {
    /// Open (creating if needed) the store under `data_dir/wasm`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let root = data_dir.as_ref().join(WASM_DIR);
        fs::create_dir_all(&root)
            .map_err(|e| StoreError::storage(format!("create {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn code_dir(&self, checksum: &Checksum) -> PathBuf {
        self.root.join(checksum.to_hex())
    }

    pub fn code_path(&self, checksum: &Checksum) -> PathBuf {
        self.code_dir(checksum).join(CODE_FILE)
    }

    pub fn manifest_path(&self, checksum: &Checksum) -> PathBuf {
        self.code_dir(checksum).join(MANIFEST_FILE)
    }

    /// Store `code` and return its checksum.
    pub fn create(&self, code: &[u8]) -> Result<Checksum> {
        if code.is_empty() {
            return Err(StoreError::InvalidInput("bytecode must not be empty".into()));
        }
        let checksum = Checksum::of(code);

        let dir = self.code_dir(&checksum);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::storage(format!("create {}", dir.display()), e))?;

        let code_path = self.code_path(&checksum);
        fs::write(&code_path, code)
            .map_err(|e| StoreError::storage(format!("write {}", code_path.display()), e))?;

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            checksum,
            size: code.len() as u64,
            report: analysis::inspect(code),
        };
        let manifest_path = self.manifest_path(&checksum);
        fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
            .map_err(|e| StoreError::storage(format!("write {}", manifest_path.display()), e))?;

        debug!(%checksum, size = code.len(), "stored bytecode");
        Ok(checksum)
    }

    /// Read back the bytecode stored under `checksum`, verbatim.
    pub fn get_code(&self, checksum: &Checksum) -> Result<Vec<u8>> {
        let path = self.code_path(checksum);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(*checksum)),
            Err(e) => Err(StoreError::storage(format!("read {}", path.display()), e)),
        }
    }

    /// Manifest for `checksum`, or `None` when missing, empty or unreadable.
    pub fn manifest(&self, checksum: &Checksum) -> Result<Option<Manifest>> {
        let path = self.manifest_path(checksum);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::storage(format!("read {}", path.display()), e)),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        match serde_json::from_slice::<Manifest>(&bytes) {
            Ok(m) if m.version == MANIFEST_VERSION && m.checksum == *checksum => Ok(Some(m)),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!(%checksum, error = %e, "ignoring unreadable manifest");
                Ok(None)
            }
        }
    }

    /// Capability report for stored code.
    ///
    /// Uses the report recorded at create time; entries without a usable
    /// manifest are inspected from their bytecode.
    pub fn analyze_code(&self, checksum: &Checksum) -> Result<AnalysisReport> {
        if !self.contains(checksum) {
            return Err(StoreError::NotFound(*checksum));
        }
        if let Some(manifest) = self.manifest(checksum)? {
            return Ok(manifest.report);
        }
        let code = self.get_code(checksum)?;
        Ok(analysis::inspect(&code))
    }

    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.code_path(checksum).is_file()
    }

    /// All checksums with stored bytecode, sorted.
    pub fn list(&self) -> Result<Vec<Checksum>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StoreError::storage(format!("list {}", self.root.display()), e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| StoreError::storage(format!("list {}", self.root.display()), e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(checksum) = name.parse::<Checksum>() {
                if self.contains(&checksum) {
                    out.push(checksum);
                }
            }
        }
        out.sort();
        Ok(out)
    }
}
