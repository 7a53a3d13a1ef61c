//! Crate-wide error taxonomy.
//!
//! Mirrors the seven error classes from the controller's error-handling
//! design: most of them are logged and absorbed at the point they occur
//! (an invalid trigger or a failed guard is not a crash, it is a no-op),
//! and only `UnknownSignal` / `InvalidSignalValue` / `TransportError` /
//! config-loading failures propagate as `Result::Err` to a caller.

use crate::handshake::state::HandshakeState;
use crate::signal::names::Signal;
use thiserror::Error;

/// Errors surfaced across the controller.
#[derive(Debug, Error)]
pub enum Error {
    /// A signal name outside the fixed universe was queried or written.
    #[error("unknown signal: {0:?}")]
    UnknownSignal(String),

    /// A signal write used a value outside the signal's domain (booleans
    /// only, so this is reserved for config-time pin/value validation).
    #[error("invalid value for signal {signal:?}: {detail}")]
    InvalidSignalValue { signal: Signal, detail: String },

    /// Hardware I/O failure: a DIO card read/write, or a serial timeout
    /// or malformed response from an ASCII load-port.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A `TPn` timer expired while a handshake machine was in `state`.
    #[error("{timer} timeout while in state {state:?}")]
    TimeoutError {
        timer: &'static str,
        state: HandshakeState,
    },

    /// A trigger was fired from a state that does not allow it.
    #[error("invalid transition: trigger {trigger:?} not valid from {state:?}")]
    InvalidTransition {
        trigger: &'static str,
        state: HandshakeState,
    },

    /// A trigger was valid but its guard returned false.
    #[error("guard failed for trigger {trigger:?} in state {state:?}")]
    GuardFailed {
        trigger: &'static str,
        state: HandshakeState,
    },

    /// A watcher panicked or returned an error; counted towards removal.
    #[error("watcher fault on signal {signal:?}: {detail}")]
    WatcherFault { signal: Signal, detail: String },

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
