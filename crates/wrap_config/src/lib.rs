//! Process-wide settings read once from the environment.

use lazy_static::lazy_static;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_INVOKE_BASE_GAS: u64 = 100;
pub const DEFAULT_HOST_OP_GAS: u64 = 10;
pub const DEFAULT_HOST_BYTE_GAS: u64 = 1;

lazy_static! {
    /// Root of the code store (`WRAPVM_DATA_DIR`).
    pub static ref DATA_DIR: PathBuf = std::env::var_os("WRAPVM_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    /// Flat charge taken before every guest invocation (`WRAPVM_INVOKE_BASE_GAS`).
    pub static ref INVOKE_BASE_GAS: u64 = env_u64("WRAPVM_INVOKE_BASE_GAS", DEFAULT_INVOKE_BASE_GAS);

    /// Charge per host bridge operation (`WRAPVM_HOST_OP_GAS`).
    pub static ref HOST_OP_GAS: u64 = env_u64("WRAPVM_HOST_OP_GAS", DEFAULT_HOST_OP_GAS);

    /// Charge per key/value byte touched by the host bridge (`WRAPVM_HOST_BYTE_GAS`).
    pub static ref HOST_BYTE_GAS: u64 = env_u64("WRAPVM_HOST_BYTE_GAS", DEFAULT_HOST_BYTE_GAS);
}

fn env_u64(name: &str, default: u64) -> u64 {
    parse_u64(std::env::var(name).ok().as_deref(), default)
}

fn parse_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
