//! Invocation client: resolves a locator to an invocable unit and performs
//! named method calls with msgpack-encoded arguments.
//!
//! ```text
//! wrap://store/<hex>  ──StoreResolver──▶ CodeStore ──WrapLoader──▶ unit
//! wrap://host/<name>  ──StaticResolver─▶ registered host unit
//! ```
//!
//! Units receive an [`Invoker`] so they can call other units (the host
//! bridge included) during their own invocation.

pub mod client;
pub mod error;
pub mod gas;
pub mod msgpack;
pub mod resolver;
pub mod uri;
pub mod wrapper;

pub use client::{invoke, Client, Metered};
pub use error::{InvokeError, Result};
pub use gas::{GasTank, UFraction};
pub use resolver::{RegistryLoader, Resolver, StaticResolver, StoreResolver, WrapLoader};
pub use uri::Uri;
pub use wrapper::{Call, Invoker, Wrapper};
