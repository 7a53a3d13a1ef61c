//! Handshake state identifiers.
//!
//! Grounded in original_source/config_states_transitions.py's `STATES`
//! list and constants.py's `E84States`/`UnavailableStates`/`TIMEOUTS`.

use std::time::Duration;

/// The fixed set of handshake states, carried over exactly from the
/// original `STATES` table (including the simulation-only `Reset` state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    Idle,
    HandshakeInitiated,
    TrReqOn,
    TransferReady,
    Busy,
    CarrierDetected,
    TransferCompleted,
    IdleUnavbl,
    HoUnavbl,
    ErrorHandling,
    ErrorRecovery,
    Timeout,
    Reset,
}

impl HandshakeState {
    pub const ALL: [HandshakeState; 13] = [
        HandshakeState::Idle,
        HandshakeState::HandshakeInitiated,
        HandshakeState::TrReqOn,
        HandshakeState::TransferReady,
        HandshakeState::Busy,
        HandshakeState::CarrierDetected,
        HandshakeState::TransferCompleted,
        HandshakeState::IdleUnavbl,
        HandshakeState::HoUnavbl,
        HandshakeState::ErrorHandling,
        HandshakeState::ErrorRecovery,
        HandshakeState::Timeout,
        HandshakeState::Reset,
    ];

    /// The `TPn` timer armed on entry to this state, per the `timeout`
    /// fields of `config_states_transitions.STATES`.
    pub fn timer(self) -> Option<(&'static str, Duration)> {
        match self {
            HandshakeState::HandshakeInitiated => Some(("TP1", Duration::from_secs(2))),
            HandshakeState::TransferReady => Some(("TP2", Duration::from_secs(2))),
            HandshakeState::Busy => Some(("TP3", Duration::from_secs(60))),
            HandshakeState::CarrierDetected => Some(("TP4", Duration::from_secs(60))),
            HandshakeState::TransferCompleted => Some(("TP5", Duration::from_secs(2))),
            _ => None,
        }
    }

    /// `tags: ['unavbl']` states (constants.py `UnavailableStates`, minus
    /// `RESET` and the error states which carry their own tag).
    pub fn is_unavailable(self) -> bool {
        matches!(self, HandshakeState::IdleUnavbl | HandshakeState::HoUnavbl)
    }

    /// `tags: ['active_error']` states.
    pub fn is_active_error(self) -> bool {
        matches!(
            self,
            HandshakeState::ErrorHandling | HandshakeState::ErrorRecovery | HandshakeState::Timeout
        )
    }

    /// `tags: ['handshake']` states: any state that is part of an
    /// in-progress transfer.
    pub fn is_handshake(self) -> bool {
        matches!(
            self,
            HandshakeState::HandshakeInitiated
                | HandshakeState::TrReqOn
                | HandshakeState::TransferReady
                | HandshakeState::Busy
                | HandshakeState::CarrierDetected
                | HandshakeState::TransferCompleted
        )
    }
}
