//! Static capability analysis of stored bytecode.
//!
//! Walks the WASM export section and derives the capability report the host
//! runtime uses for admission. Bytecode that is not a WASM module (or is
//! malformed) yields the default report: no special capabilities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

const WASM_MAGIC: &[u8; 4] = b"\0asm";
const WASM_VERSION: [u8; 4] = [1, 0, 0, 0];
const EXPORT_SECTION: u8 = 7;
const EXTERNAL_FUNC: u8 = 0;

/// Entry points a contract must export to take part in interchain messaging.
pub const IBC_ENTRY_POINTS: [&str; 6] = [
    "ibc_channel_open",
    "ibc_channel_connect",
    "ibc_channel_close",
    "ibc_packet_receive",
    "ibc_packet_ack",
    "ibc_packet_timeout",
];

const CAPABILITY_PREFIX: &str = "requires_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub has_ibc_entry_points: bool,
    /// Capabilities declared through `requires_<cap>` exports.
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    /// Exported function names.
    #[serde(default)]
    pub exports: BTreeSet<String>,
}

impl AnalysisReport {
    pub fn from_exports(exports: BTreeSet<String>) -> Self {
        let has_ibc_entry_points = IBC_ENTRY_POINTS.iter().all(|e| exports.contains(*e));
        let required_capabilities = exports
            .iter()
            .filter_map(|name| name.strip_prefix(CAPABILITY_PREFIX))
            .filter(|cap| !cap.is_empty())
            .map(str::to_owned)
            .collect();
        Self {
            has_ibc_entry_points,
            required_capabilities,
            exports,
        }
    }
}

/// Inspect `code` and build its capability report.
pub fn inspect(code: &[u8]) -> AnalysisReport {
    match exported_functions(code) {
        Ok(exports) => AnalysisReport::from_exports(exports),
        Err(reason) => {
            debug!(%reason, "bytecode not inspectable, reporting no capabilities");
            AnalysisReport::default()
        }
    }
}

#[derive(Error, Debug)]
enum ParseError {
    #[error("not a wasm module")]
    NotWasm,
    #[error("unexpected end of module")]
    Truncated,
    #[error("bad leb128 integer")]
    Leb128,
    #[error("export name is not utf-8")]
    Utf8,
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, ParseError> {
        let (&b, rest) = self.buf.split_first().ok_or(ParseError::Truncated)?;
        self.buf = rest;
        Ok(b)
    }

    fn uleb(&mut self) -> Result<usize, ParseError> {
        let v = leb128::read::unsigned(&mut self.buf).map_err(|_| ParseError::Leb128)?;
        usize::try_from(v).map_err(|_| ParseError::Leb128)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if n > self.buf.len() {
            return Err(ParseError::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn exported_functions(code: &[u8]) -> Result<BTreeSet<String>, ParseError> {
    let mut r = Reader { buf: code };
    if r.take(4).map_err(|_| ParseError::NotWasm)? != WASM_MAGIC
        || r.take(4).map_err(|_| ParseError::NotWasm)? != WASM_VERSION
    {
        return Err(ParseError::NotWasm);
    }

    let mut exports = BTreeSet::new();
    while !r.is_empty() {
        let id = r.byte()?;
        let size = r.uleb()?;
        let body = r.take(size)?;
        if id != EXPORT_SECTION {
            continue;
        }
        let mut s = Reader { buf: body };
        let count = s.uleb()?;
        for _ in 0..count {
            let len = s.uleb()?;
            let name = std::str::from_utf8(s.take(len)?).map_err(|_| ParseError::Utf8)?;
            let kind = s.byte()?;
            let _index = s.uleb()?;
            if kind == EXTERNAL_FUNC {
                exports.insert(name.to_owned());
            }
        }
    }
    Ok(exports)
}
