#![allow(dead_code)]

use serde::Deserialize;
use serde_bytes::ByteBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wrap_client::{invoke, msgpack, Call, InvokeError, Invoker, Result, Wrapper};
use wrapvm::{
    state_uri, BlockInfo, CallEnv, Checksum, ContractInfo, Env, GasConfig, KeyArgs, KeyValueArgs,
    MessageInfo, RegistryLoader, Response, Vm, VmConfig,
};

pub const ENGINE: &str = "WrapVM";
pub const HELLO_CODE: &[u8] = b"\0asm\x01\0\0\0hello-world";

/// Greets, remembers a name in host state.
pub struct HelloWorld;

#[derive(Deserialize)]
struct InitArgs {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNameArgs {
    new_name: String,
}

#[derive(Deserialize)]
struct SpamArgs {
    count: u32,
    size: usize,
}

fn set(invoker: &dyn Invoker, key: &[u8], value: &[u8]) -> Result<()> {
    let _: bool = invoke(
        invoker,
        &state_uri(),
        "Set",
        &KeyValueArgs {
            key: key.to_vec(),
            value: value.to_vec(),
        },
    )?;
    Ok(())
}

fn get(invoker: &dyn Invoker, key: &[u8]) -> Result<Vec<u8>> {
    let v: ByteBuf = invoke(invoker, &state_uri(), "Get", &KeyArgs { key: key.to_vec() })?;
    Ok(v.into_vec())
}

fn reply(text: String) -> Result<Vec<u8>> {
    msgpack::encode(&Response::with_data(text.into_bytes()))
}

pub fn greeting(name: &str) -> Vec<u8> {
    format!("Hello {name}. Initialized!").into_bytes()
}

impl Wrapper for HelloWorld {
    fn invoke(&self, invoker: &dyn Invoker, call: &Call<'_>) -> Result<Vec<u8>> {
        match call.method {
            "instantiate" => {
                let a: InitArgs = msgpack::decode(call.args)?;
                set(invoker, b"name", a.name.as_bytes())?;
                reply(format!("Hello {}. Initialized!", a.name))
            }
            "updateName" => {
                let a: UpdateNameArgs = msgpack::decode(call.args)?;
                set(invoker, b"name", a.new_name.as_bytes())?;
                reply(format!("Name updated to {}", a.new_name))
            }
            "sayHello" => {
                let name = get(invoker, b"name")?;
                reply(format!("Hello from {ENGINE}, {}", String::from_utf8_lossy(&name)))
            }
            "whoami" => {
                let env: CallEnv = msgpack::decode(call.env.unwrap_or_default())?;
                reply(format!("{}@{}", env.info.sender, env.env.block.height))
            }
            "spam" => {
                let a: SpamArgs = msgpack::decode(call.args)?;
                for i in 0..a.count {
                    set(invoker, format!("spam/{i}").as_bytes(), &vec![b'x'; a.size])?;
                }
                reply("done".into())
            }
            "writeThenFail" => {
                set(invoker, b"name", b"Mallory")?;
                Err(InvokeError::Guest("refusing to finish".into()))
            }
            "panic" => panic!("guest bug"),
            other => Err(InvokeError::UnknownMethod(other.into())),
        }
    }
}

pub fn env() -> Env {
    Env {
        block: BlockInfo {
            height: 12_345,
            time: 1_571_797_419_879_305_533,
            chain_id: "cosmos-testnet-14002".into(),
        },
        contract: ContractInfo {
            address: "cosmos1contract".into(),
        },
        transaction: None,
    }
}

pub fn info(sender: &str) -> MessageInfo {
    MessageInfo {
        sender: sender.into(),
        funds: vec![],
    }
}

pub fn gas() -> GasConfig {
    GasConfig {
        invoke_base: 100,
        host_op: 10,
        host_per_byte: 1,
    }
}

/// A fresh VM with the hello-world code stored.
pub fn hello_vm() -> (TempDir, Vm, Checksum) {
    let dir = tempfile::tempdir().unwrap();
    let loader = RegistryLoader::new().register_code(HELLO_CODE, Arc::new(HelloWorld));
    let vm = Vm::new(VmConfig::new(dir.path()).with_gas(gas()), Arc::new(loader)).unwrap();
    let checksum = vm.create(HELLO_CODE).unwrap();
    (dir, vm, checksum)
}

pub fn data(response: &Response) -> String {
    String::from_utf8(response.data.clone().unwrap_or_default()).unwrap()
}
