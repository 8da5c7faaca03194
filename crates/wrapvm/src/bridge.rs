//! Host state bridge: the unit guests call to read and write the key-value
//! scope of the contract currently executing.
//!
//! A scope is bound for exactly one call at a time, and only the invoker
//! carrying that call's gas tank can reach it. Writes land in a
//! [`StateOverlay`] and reach the scope only when the caller commits.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;
use wrap_client::{msgpack, Call, GasTank, InvokeError, Invoker, Uri, Wrapper};

use crate::error::VmError;
use crate::state::{KvStore, StateOverlay, StateScope};

/// Name the bridge is registered under: `wrap://host/state`.
pub const STATE_UNIT: &str = "state";

/// Status returned by `Write`.
pub const WRITE_OK: u32 = 0;

pub fn state_uri() -> Uri {
    Uri::host(STATE_UNIT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostMethod {
    Set,
    Get,
    Has,
    Remove,
    /// Set, or delete when `value` is absent.
    Write,
}

impl HostMethod {
    pub const ALL: [HostMethod; 5] = [
        HostMethod::Set,
        HostMethod::Get,
        HostMethod::Has,
        HostMethod::Remove,
        HostMethod::Write,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            HostMethod::Set => "Set",
            HostMethod::Get => "Get",
            HostMethod::Has => "Has",
            HostMethod::Remove => "Remove",
            HostMethod::Write => "Write",
        }
    }
}

impl FromStr for HostMethod {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostMethod::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| InvokeError::UnknownMethod(s.to_string()))
    }
}

impl fmt::Display for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Args of `Get`, `Has` and `Remove`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyArgs {
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
}

/// Args of `Set`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyValueArgs {
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}

/// Args of `Write`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WriteArgs {
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
    #[serde(default, with = "serde_bytes")]
    pub value: Option<Vec<u8>>,
}

/// Per-operation gas: `op + per_byte * bytes touched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCosts {
    pub op: u64,
    pub per_byte: u64,
}

impl HostCosts {
    pub fn of(&self, bytes: usize) -> u64 {
        let bytes = u64::try_from(bytes).unwrap_or(u64::MAX);
        self.op.saturating_add(self.per_byte.saturating_mul(bytes))
    }
}

/// The scope bound for the in-flight call and the gas tank of that call.
/// Only invokers exposing that very tank reach the scope.
struct Binding {
    owner: usize,
    overlay: Arc<StateOverlay>,
}

fn tank_addr(gas: &GasTank) -> usize {
    gas as *const GasTank as usize
}

pub struct HostBridge {
    slot: Mutex<Option<Binding>>,
    costs: HostCosts,
}

impl HostBridge {
    pub fn new(costs: HostCosts) -> Self {
        Self {
            slot: Mutex::new(None),
            costs,
        }
    }

    /// Bind `scope` to the call metered by `gas` until the returned guard is
    /// dropped. Host calls arriving through any other invoker see `Unbound`.
    pub fn bind<'a>(&'a self, scope: StateScope, gas: &'a GasTank) -> Result<ScopeGuard<'a>, VmError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(VmError::AlreadyBound);
        }
        let overlay = Arc::new(StateOverlay::new(scope));
        *slot = Some(Binding {
            owner: tank_addr(gas),
            overlay: Arc::clone(&overlay),
        });
        Ok(ScopeGuard {
            bridge: self,
            overlay,
            _gas: gas,
        })
    }

    pub fn is_bound(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn unbind(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn bound<'g>(&self, invoker: &'g dyn Invoker) -> Result<(Arc<StateOverlay>, &'g GasTank), InvokeError> {
        let gas = invoker.gas().ok_or(InvokeError::Unbound)?;
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(b) if b.owner == tank_addr(gas) => Ok((Arc::clone(&b.overlay), gas)),
            _ => Err(InvokeError::Unbound),
        }
    }

    /// Decode `args` for `method` and run it against the scope bound to the
    /// invoker's call.
    pub fn dispatch(
        &self,
        invoker: &dyn Invoker,
        method: HostMethod,
        args: &[u8],
    ) -> Result<Vec<u8>, InvokeError> {
        let (state, gas) = self.bound(invoker)?;
        let charge = |bytes: usize| gas.charge(self.costs.of(bytes));
        trace!(%method, "host call");
        match method {
            HostMethod::Set => {
                let a: KeyValueArgs = msgpack::decode(args)?;
                charge(a.key.len() + a.value.len())?;
                state.set(&a.key, &a.value);
                msgpack::encode(&true)
            }
            HostMethod::Get => {
                let a: KeyArgs = msgpack::decode(args)?;
                let value = state.get(&a.key).unwrap_or_default();
                charge(a.key.len() + value.len())?;
                msgpack::encode(&ByteBuf::from(value))
            }
            HostMethod::Has => {
                let a: KeyArgs = msgpack::decode(args)?;
                charge(a.key.len())?;
                let has = state.get(&a.key).is_some_and(|v| !v.is_empty());
                msgpack::encode(&has)
            }
            HostMethod::Remove => {
                let a: KeyArgs = msgpack::decode(args)?;
                charge(a.key.len())?;
                state.delete(&a.key);
                msgpack::encode(&true)
            }
            HostMethod::Write => {
                let a: WriteArgs = msgpack::decode(args)?;
                charge(a.key.len() + a.value.as_ref().map_or(0, Vec::len))?;
                match a.value {
                    Some(v) => state.set(&a.key, &v),
                    None => state.delete(&a.key),
                }
                msgpack::encode(&WRITE_OK)
            }
        }
    }
}

impl Wrapper for HostBridge {
    fn invoke(&self, invoker: &dyn Invoker, call: &Call<'_>) -> Result<Vec<u8>, InvokeError> {
        let method: HostMethod = call.method.parse()?;
        self.dispatch(invoker, method, call.args)
    }
}

/// Keeps a scope bound. Dropping it unbinds and discards uncommitted writes.
/// Borrows the call's gas tank so the binding cannot outlive it.
pub struct ScopeGuard<'a> {
    bridge: &'a HostBridge,
    overlay: Arc<StateOverlay>,
    _gas: &'a GasTank,
}

impl ScopeGuard<'_> {
    pub fn pending(&self) -> usize {
        self.overlay.pending()
    }

    /// Flush buffered writes to the scope and unbind.
    pub fn commit(self) -> usize {
        self.overlay.commit()
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.bridge.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use proptest::prelude::*;
    use wrap_client::{invoke, Client, StaticResolver};

    fn setup() -> (Arc<HostBridge>, Client) {
        let bridge = Arc::new(HostBridge::new(HostCosts { op: 10, per_byte: 1 }));
        let client = Client::default()
            .with_resolver(Arc::new(StaticResolver::new().register(STATE_UNIT, bridge.clone())));
        (bridge, client)
    }

    fn tank() -> GasTank {
        GasTank::new(1_000_000, 0)
    }

    fn key(k: &[u8]) -> KeyArgs {
        KeyArgs { key: k.to_vec() }
    }

    fn kv(k: &[u8], v: &[u8]) -> KeyValueArgs {
        KeyValueArgs { key: k.to_vec(), value: v.to_vec() }
    }

    #[test]
    fn method_table_is_complete() {
        for m in HostMethod::ALL {
            assert_eq!(m.name().parse::<HostMethod>().unwrap(), m);
        }
        assert!(matches!("Delete".parse::<HostMethod>(), Err(InvokeError::UnknownMethod(_))));
    }

    #[test]
    fn set_has_remove() {
        let (bridge, client) = setup();
        let mem = MemoryStore::new();
        let gas = tank();
        let guard = bridge.bind(Arc::new(mem.clone()), &gas).unwrap();
        let call = client.metered(&gas);
        let uri = state_uri();

        let ok: bool = invoke(&call, &uri, "Set", &kv(b"k", b"v")).unwrap();
        assert!(ok);
        let has: bool = invoke(&call, &uri, "Has", &key(b"k")).unwrap();
        assert!(has);
        let _: bool = invoke(&call, &uri, "Remove", &key(b"k")).unwrap();
        let has: bool = invoke(&call, &uri, "Has", &key(b"k")).unwrap();
        assert!(!has);

        assert_eq!(guard.commit(), 1);
        assert!(mem.is_empty());
        assert!(!bridge.is_bound());
    }

    #[test]
    fn get_missing_is_empty_and_empty_value_is_not_has() {
        let (bridge, client) = setup();
        let gas = tank();
        let _guard = bridge.bind(Arc::new(MemoryStore::new()), &gas).unwrap();
        let call = client.metered(&gas);
        let v: ByteBuf = invoke(&call, &state_uri(), "Get", &key(b"missing")).unwrap();
        assert!(v.is_empty());
        let _: bool = invoke(&call, &state_uri(), "Set", &kv(b"e", b"")).unwrap();
        let has: bool = invoke(&call, &state_uri(), "Has", &key(b"e")).unwrap();
        assert!(!has);
    }

    #[test]
    fn write_sets_or_deletes() {
        let (bridge, client) = setup();
        let mem = MemoryStore::new();
        let gas = tank();
        let guard = bridge.bind(Arc::new(mem.clone()), &gas).unwrap();
        let call = client.metered(&gas);
        let write = |k: &[u8], v: Option<&[u8]>| -> u32 {
            invoke(
                &call,
                &state_uri(),
                "Write",
                &WriteArgs { key: k.to_vec(), value: v.map(<[u8]>::to_vec) },
            )
            .unwrap()
        };
        assert_eq!(write(b"a", Some(&b"1"[..])), WRITE_OK);
        write(b"b", Some(&b"2"[..]));
        write(b"b", None);
        guard.commit();
        assert_eq!(mem.get(b"a").unwrap(), b"1");
        assert!(mem.get(b"b").is_none());
    }

    #[test]
    fn unbound_calls_fail() {
        let (_bridge, client) = setup();
        let gas = tank();
        let err = invoke::<_, ByteBuf>(&client.metered(&gas), &state_uri(), "Get", &key(b"k")).unwrap_err();
        assert!(matches!(err, InvokeError::Unbound));
    }

    #[test]
    fn only_the_bound_call_reaches_state() {
        let (bridge, client) = setup();
        let mem = MemoryStore::new();
        let gas = tank();
        let guard = bridge.bind(Arc::new(mem.clone()), &gas).unwrap();

        // plain client: no call identity at all
        let err = invoke::<_, bool>(&client, &state_uri(), "Set", &kv(b"intruder", b"1")).unwrap_err();
        assert!(matches!(err, InvokeError::Unbound));

        // metered, but by some other call's tank
        let other = tank();
        let err = invoke::<_, bool>(&client.metered(&other), &state_uri(), "Set", &kv(b"intruder", b"1"))
            .unwrap_err();
        assert!(matches!(err, InvokeError::Unbound));
        assert_eq!(other.used(), 0);

        assert_eq!(guard.pending(), 0);
        guard.commit();
        assert!(mem.is_empty());
    }

    #[test]
    fn second_bind_is_rejected() {
        let (bridge, _client) = setup();
        let (a, b) = (tank(), tank());
        let _guard = bridge.bind(Arc::new(MemoryStore::new()), &a).unwrap();
        assert!(matches!(bridge.bind(Arc::new(MemoryStore::new()), &b), Err(VmError::AlreadyBound)));
    }

    #[test]
    fn dropped_guard_discards_and_unbinds() {
        let (bridge, client) = setup();
        let mem = MemoryStore::new();
        let gas = tank();
        {
            let _guard = bridge.bind(Arc::new(mem.clone()), &gas).unwrap();
            let _: bool = invoke(&client.metered(&gas), &state_uri(), "Set", &kv(b"k", b"v")).unwrap();
        }
        assert!(!bridge.is_bound());
        assert!(mem.is_empty());
        let err = invoke::<_, bool>(&client.metered(&gas), &state_uri(), "Has", &key(b"k")).unwrap_err();
        assert!(matches!(err, InvokeError::Unbound));
    }

    #[test]
    fn unknown_method_leaves_state_untouched() {
        let (bridge, client) = setup();
        let gas = tank();
        let guard = bridge.bind(Arc::new(MemoryStore::new()), &gas).unwrap();
        let err = invoke::<_, bool>(&client.metered(&gas), &state_uri(), "Drop", &key(b"k")).unwrap_err();
        assert!(matches!(err, InvokeError::UnknownMethod(m) if m == "Drop"));
        assert_eq!(guard.pending(), 0);
    }

    #[test]
    fn calls_charge_per_byte() {
        let (bridge, client) = setup();
        let gas = tank();
        let guard = bridge.bind(Arc::new(MemoryStore::new()), &gas).unwrap();
        let _: bool = invoke(&client.metered(&gas), &state_uri(), "Set", &kv(b"name", b"Joe")).unwrap();
        assert_eq!(gas.used(), 10 + 7);
        drop(guard);

        let tight = GasTank::new(5, 0);
        let _guard = bridge.bind(Arc::new(MemoryStore::new()), &tight).unwrap();
        let err = invoke::<_, bool>(&client.metered(&tight), &state_uri(), "Has", &key(b"name")).unwrap_err();
        assert!(matches!(err, InvokeError::OutOfGas { .. }));
        assert_eq!(tight.used(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn set_then_get_returns_value(k in proptest::collection::vec(any::<u8>(), 0..32),
                                      v in proptest::collection::vec(any::<u8>(), 1..64)) {
            let (bridge, client) = setup();
            let gas = tank();
            let _guard = bridge.bind(Arc::new(MemoryStore::new()), &gas).unwrap();
            let call = client.metered(&gas);
            let _: bool = invoke(&call, &state_uri(), "Set",
                &KeyValueArgs { key: k.clone(), value: v.clone() }).unwrap();
            let got: ByteBuf = invoke(&call, &state_uri(), "Get", &KeyArgs { key: k.clone() }).unwrap();
            prop_assert_eq!(got.into_vec(), v);
            let has: bool = invoke(&call, &state_uri(), "Has", &KeyArgs { key: k }).unwrap();
            prop_assert!(has);
        }
    }
}
