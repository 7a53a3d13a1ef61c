//! Signal Bus facade.
//!
//! Follows the same facade-module convention as `src/bus/mod.rs`: the
//! public surface is re-exported here, with the fixed signal universe,
//! the bus itself, and callback dispatch split into focused submodules.

pub mod bus;
pub mod callback;
pub mod names;

pub use bus::SignalBus;
pub use callback::{CallbackRegistry, Watcher};
pub use names::{Port, Signal};
