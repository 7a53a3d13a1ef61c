//! Load-Port Adapter facade.

pub mod adapter;
pub mod ascii;
pub mod condition;

pub use adapter::{LoadPortAdapter, ParallelAdapter, PortStatus};
pub use ascii::AsciiAdapter;
pub use condition::{PortCondition, PortState};
