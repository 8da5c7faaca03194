use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info_span, warn};
use wrap_client::{
    msgpack, Call, Client, GasTank, InvokeError, Invoker, StaticResolver, StoreResolver, UFraction,
    Uri, WrapLoader,
};
use wrap_store::{AnalysisReport, Checksum, CodeStore};

use crate::bridge::{HostBridge, STATE_UNIT};
use crate::config::VmConfig;
use crate::error::{ExecutionError, Result, VmError};
use crate::state::StateScope;
use crate::types::{CallEnv, Env, GasMeter, MessageInfo, Response};

/// Entry point invoked by [`Vm::instantiate`].
pub const INSTANTIATE_ENTRY: &str = "instantiate";

/// Response plus gas used, or the failure plus gas used.
pub type CallResult = std::result::Result<(Response, u64), ExecutionError>;

#[derive(Debug, Clone, Copy)]
enum Entry {
    Instantiate,
    Execute,
}

impl Entry {
    fn as_str(self) -> &'static str {
        match self {
            Entry::Instantiate => "instantiate",
            Entry::Execute => "execute",
        }
    }
}

/// Contract execution adapter.
///
/// One call runs at a time per instance: the host state bridge is bound to
/// the caller's scope for the duration of the call and unbound afterwards.
/// Only invocations made through that call's invoker reach the scope.
///
/// A guest may invoke another stored unit (`wrap://store/<other>`) through
/// the invoker it was handed. The nested unit runs inside the same call: it
/// shares the caller's scope, gas and commit/discard outcome.
pub struct Vm {
    config: VmConfig,
    store: CodeStore,
    bridge: Arc<HostBridge>,
    client: Client,
    call_lock: Mutex<()>,
}

impl Vm {
    /// Store units resolve through `loader`; the host bridge is served at
    /// `wrap://host/state`.
    pub fn new(config: VmConfig, loader: Arc<dyn WrapLoader>) -> Result<Self> {
        Self::with_client(config, move |store, bridge| {
            Client::default()
                .with_resolver(Arc::new(StaticResolver::new().register(STATE_UNIT, bridge)))
                .with_resolver(Arc::new(StoreResolver::new(store.clone(), loader)))
        })
    }

    /// Build the resolver chain yourself. `build` receives the opened store
    /// and the bridge, which it must register for guests to reach state.
    pub fn with_client<F>(config: VmConfig, build: F) -> Result<Self>
    where
        F: FnOnce(&CodeStore, Arc<HostBridge>) -> Client,
    {
        let store = CodeStore::open(&config.data_dir)?;
        let bridge = Arc::new(HostBridge::new(config.gas.host_costs()));
        let client = build(&store, Arc::clone(&bridge));
        Ok(Self {
            config,
            store,
            bridge,
            client,
            call_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn store(&self) -> &CodeStore {
        &self.store
    }

    /// True while a call (or [`Vm::with_state`]) has a scope bound.
    pub fn is_bound(&self) -> bool {
        self.bridge.is_bound()
    }

    /// Run `f` with `scope` bound, seeing state the way a guest does.
    ///
    /// Takes the call lock, so it never observes another call's scope.
    /// Writes are committed when `f` succeeds and discarded otherwise.
    pub fn with_state<R, F>(&self, scope: StateScope, f: F) -> Result<R>
    where
        F: FnOnce(&dyn Invoker) -> wrap_client::Result<R>,
    {
        let _serial = self.call_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let tank = GasTank::new(u64::MAX, 0);
        let guard = self.bridge.bind(scope, &tank)?;
        let out = f(&self.client.metered(&tank))?;
        guard.commit();
        Ok(out)
    }

    pub fn create(&self, code: &[u8]) -> Result<Checksum> {
        Ok(self.store.create(code)?)
    }

    pub fn get_code(&self, checksum: &Checksum) -> Result<Vec<u8>> {
        Ok(self.store.get_code(checksum)?)
    }

    pub fn analyze_code(&self, checksum: &Checksum) -> Result<AnalysisReport> {
        Ok(self.store.analyze_code(checksum)?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn instantiate(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        init_msg: &[u8],
        scope: StateScope,
        gas_meter: &dyn GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult {
        self.call(
            Entry::Instantiate,
            checksum,
            env,
            info,
            init_msg,
            INSTANTIATE_ENTRY,
            scope,
            gas_meter,
            gas_limit,
            deserialization_cost,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        method: &str,
        scope: StateScope,
        gas_meter: &dyn GasMeter,
        gas_limit: u64,
        deserialization_cost: UFraction,
    ) -> CallResult {
        self.call(
            Entry::Execute,
            checksum,
            env,
            info,
            msg,
            method,
            scope,
            gas_meter,
            gas_limit,
            deserialization_cost,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn call(
        &self,
        entry: Entry,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        method: &str,
        scope: StateScope,
        gas_meter: &dyn GasMeter,
        gas_limit: u64,
        rate: UFraction,
    ) -> CallResult {
        let _serial = self.call_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let span = info_span!("wrapvm.call", entry = entry.as_str(), method, %checksum);
        let _enter = span.enter();

        let tank = GasTank::new(gas_limit, gas_meter.gas_consumed());
        let outcome = self.run(&tank, checksum, env, info, msg, method, scope, rate);
        let gas_used = tank.used();
        metrics::histogram!("wrapvm_gas_used").record(gas_used as f64);

        match outcome {
            Ok(response) => {
                metrics::counter!("wrapvm_calls_total", "entry" => entry.as_str(), "outcome" => "ok")
                    .increment(1);
                debug!(gas_used, "call succeeded");
                Ok((response, gas_used))
            }
            Err(error) => {
                metrics::counter!("wrapvm_calls_total", "entry" => entry.as_str(), "outcome" => "error")
                    .increment(1);
                warn!(%error, gas_used, "call failed");
                Err(ExecutionError { error, gas_used })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        tank: &GasTank,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        method: &str,
        scope: StateScope,
        rate: UFraction,
    ) -> Result<Response> {
        let args = decode_message(msg)?;
        let call_env = msgpack::encode(&CallEnv {
            env: env.clone(),
            info: info.clone(),
        })?;

        tank.charge(self.config.gas.invoke_base)?;

        let guard = self.bridge.bind(scope, tank)?;
        let invoker = self.client.metered(tank);
        let call = Call::new(method, &args).with_env(&call_env);
        let raw = guarded_invoke(&invoker, &Uri::store(checksum), &call).map_err(|e| {
            // a guest may swallow the refusal and report its own error
            if tank.exhausted() {
                VmError::InsufficientGas(e.to_string())
            } else {
                VmError::from(e)
            }
        })?;

        tank.charge(rate.mul_floor(raw.len() as u64)).map_err(|_| {
            VmError::InsufficientGas(format!(
                "cannot cover deserialization of {} byte result",
                raw.len()
            ))
        })?;
        let response: Response = msgpack::decode(&raw)?;

        let writes = guard.commit();
        debug!(writes, "state committed");
        Ok(response)
    }
}

fn guarded_invoke(invoker: &dyn Invoker, uri: &Uri, call: &Call<'_>) -> wrap_client::Result<Vec<u8>> {
    panic::catch_unwind(AssertUnwindSafe(|| invoker.invoke(uri, call)))
        .unwrap_or_else(|_| Err(InvokeError::Guest("guest panicked".into())))
}

/// JSON message to msgpack map. Empty input (or `null`) is an empty map.
fn decode_message(msg: &[u8]) -> Result<Vec<u8>> {
    if msg.iter().all(u8::is_ascii_whitespace) {
        return Ok(msgpack::encode(&serde_json::Map::new())?);
    }
    let value: serde_json::Value =
        serde_json::from_slice(msg).map_err(|e| VmError::Serialization(format!("message: {e}")))?;
    match value {
        serde_json::Value::Object(map) => Ok(msgpack::encode(&map)?),
        serde_json::Value::Null => Ok(msgpack::encode(&serde_json::Map::new())?),
        _ => Err(VmError::Serialization("message must be a JSON object".into())),
    }
}
