//! Contract execution adapter.
//!
//! [`Vm`] ties the content-addressed code store, the invocation client and
//! the host state bridge together behind the lifecycle a chain VM expects:
//! `create` / `get_code` / `analyze_code` for code, `instantiate` /
//! `execute` for calls.
//!
//! ```text
//! instantiate/execute
//!   ├─ lock, charge invoke base
//!   ├─ bind scope ──▶ HostBridge (wrap://host/state)
//!   ├─ invoke wrap://store/<checksum> (guest calls back into the bridge)
//!   ├─ charge result deserialization
//!   └─ commit writes, unbind
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod state;
pub mod types;
pub mod vm;

pub use bridge::{
    state_uri, HostBridge, HostCosts, HostMethod, KeyArgs, KeyValueArgs, ScopeGuard, WriteArgs,
    STATE_UNIT, WRITE_OK,
};
pub use config::{GasConfig, VmConfig};
pub use error::{ExecutionError, Result, VmError};
pub use state::{KvStore, MemoryStore, PrefixStore, StateOverlay, StateScope};
pub use types::{
    Attribute, BlockInfo, CallEnv, Coin, ContractInfo, Env, Event, FixedGasMeter, GasMeter,
    MessageInfo, Response, SubMsg, TransactionInfo,
};
pub use vm::{CallResult, Vm, INSTANTIATE_ENTRY};

pub use wrap_client::{RegistryLoader, UFraction, WrapLoader};
pub use wrap_store::{AnalysisReport, Checksum};
