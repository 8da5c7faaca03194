//! Host-runtime types passed into and out of a contract call.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    pub block: BlockInfo,
    pub contract: ContractInfo,
    #[serde(default)]
    pub transaction: Option<TransactionInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: u64,
    /// Nanoseconds since the unix epoch.
    pub time: u64,
    pub chain_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInfo {
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionInfo {
    pub index: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageInfo {
    pub sender: String,
    #[serde(default)]
    pub funds: Vec<Coin>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    /// Decimal string; amounts exceed u64.
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

/// What a guest sees as its call environment.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEnv {
    pub env: Env,
    pub info: MessageInfo,
}

/// Result of a successful call. Guests return this msgpack-encoded; every
/// field is optional on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    #[serde(default, with = "serde_bytes")]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub messages: Vec<SubMsg>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Response {
    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Follow-up message the host routes after the call; `msg` is opaque here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubMsg {
    pub id: u64,
    #[serde(with = "serde_bytes")]
    pub msg: Vec<u8>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Event {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Host gas meter; only the running total is read.
pub trait GasMeter {
    fn gas_consumed(&self) -> u64;
}

/// Meter with a fixed reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGasMeter(pub u64);

impl GasMeter for FixedGasMeter {
    fn gas_consumed(&self) -> u64 {
        self.0
    }
}
