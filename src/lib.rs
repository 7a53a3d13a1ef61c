#![doc = r#"
SEMI E84 parallel-I/O handoff controller library crate.

Mediates the E84 handshake between an AGV (active side) and two load
ports (passive side): a per-port handshake state machine, a signal bus
with change notification, a port-condition arbiter, and the controller
that wires them together.

Modules:
- signal: the fixed signal table (`names`), change-notifying bus (`bus`),
  and watcher dispatch (`callback`)
- port: the load-port adapter contract (`adapter`), its ASCII/serial
  dialect (`ascii`), and the derived port condition (`condition`)
- handshake: the per-port handshake state machine (`machine`, `state`,
  `timeout`)
- arbiter: the port-condition arbiter reacting to signal edges outside
  an active handshake
- controller: drives port selection, global availability, and the
  happy-path handshake advancement
- io_bridge / hardware: the seam to physical or simulated hardware
- config / cli / logging: the ambient operational stack
"#]

pub mod arbiter;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod handshake;
pub mod hardware;
pub mod io_bridge;
pub mod logging;
pub mod port;
pub mod signal;

pub use controller::Controller;
pub use error::{Error, Result};

#[cfg(test)]
mod scenarios;
