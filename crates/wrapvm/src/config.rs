use std::path::PathBuf;

use crate::bridge::HostCosts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasConfig {
    /// Charged before the guest runs.
    pub invoke_base: u64,
    pub host_op: u64,
    pub host_per_byte: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            invoke_base: wrap_config::DEFAULT_INVOKE_BASE_GAS,
            host_op: wrap_config::DEFAULT_HOST_OP_GAS,
            host_per_byte: wrap_config::DEFAULT_HOST_BYTE_GAS,
        }
    }
}

impl GasConfig {
    pub fn from_env() -> Self {
        Self {
            invoke_base: *wrap_config::INVOKE_BASE_GAS,
            host_op: *wrap_config::HOST_OP_GAS,
            host_per_byte: *wrap_config::HOST_BYTE_GAS,
        }
    }

    pub fn host_costs(&self) -> HostCosts {
        HostCosts {
            op: self.host_op,
            per_byte: self.host_per_byte,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub data_dir: PathBuf,
    pub gas: GasConfig,
}

impl VmConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            gas: GasConfig::default(),
        }
    }

    /// `WRAPVM_DATA_DIR` and the `WRAPVM_*_GAS` variables.
    pub fn from_env() -> Self {
        Self {
            data_dir: wrap_config::DATA_DIR.clone(),
            gas: GasConfig::from_env(),
        }
    }

    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }
}
