//! Per-port handshake state machine.
//!
//! Grounded in original_source/state_machine.py's `E84StateMachine` and
//! original_source/config_states_transitions.py's `TRANSITIONS` table,
//! ported from the `transitions` library's declarative conditions/on_enter
//! hooks to explicit Rust methods.

use crate::handshake::state::HandshakeState;
use crate::handshake::timeout::TimeoutTimer;
use crate::port::adapter::LoadPortAdapter;
use crate::signal::bus::SignalBus;
use crate::signal::names::{Port, Signal};

/// Which transfer direction a handshake is carrying out, set on entry to
/// `HandshakeInitiated` and cleared on return to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Unload,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRecord {
    pub old: HandshakeState,
    pub new: HandshakeState,
    pub trigger: &'static str,
}

/// One load port's handshake state machine.
pub struct HandshakeMachine {
    port: Port,
    state: HandshakeState,
    operation: Option<Operation>,
    timer: TimeoutTimer,
    transitions: Vec<TransitionRecord>,
}

impl HandshakeMachine {
    pub fn new(port: Port) -> Self {
        Self {
            port,
            state: HandshakeState::Idle,
            operation: None,
            timer: TimeoutTimer::new(),
            transitions: Vec::new(),
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn transition_log(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Checks the currently armed `TPn` timer and escalates to `TIMEOUT`
    /// if it has expired.
    pub fn poll_timeout(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        if let Some(timer) = self.timer.expired() {
            tracing::error!(port = %self.port, timer, state = ?self.state, "handshake timer expired");
            self.to_error_recovery_from_timeout(bus, adapter);
        }
    }

    // ------------------------------------------------------------------
    // Guards. Each mirrors a `condition` method in the original machine.
    // ------------------------------------------------------------------

    fn can_start_handshake(&self, bus: &SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        let extra_signals_on = bus.get(Signal::TrReq) || bus.get(Signal::Busy) || bus.get(Signal::Compt);
        if extra_signals_on {
            return false;
        }
        adapter.ho_available(bus)
    }

    fn validate_tr_req(&self, bus: &SignalBus) -> bool {
        let cs_valid = bus.get(Signal::Cs0) || bus.get(Signal::Cs1);
        cs_valid && bus.get(Signal::Valid) && bus.get(Signal::TrReq)
    }

    fn validate_ready(&self, bus: &SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        let status = adapter.status(bus);
        status.lpt_ready && !status.lpt_error
    }

    fn validate_busy_conditions(&self, bus: &SignalBus) -> bool {
        let cs_valid = bus.get(Signal::Cs0) || bus.get(Signal::Cs1);
        cs_valid && bus.get(Signal::Valid) && bus.get(Signal::TrReq) && bus.get(Signal::Busy)
    }

    pub fn validate_carrier_detected(&self, bus: &SignalBus) -> bool {
        let carrier = bus.get(Signal::CarrierPresent(self.port));
        match self.operation {
            None => false,
            Some(Operation::Unload) => !carrier,
            Some(Operation::Load) => carrier,
        }
    }

    fn transfer_complete(&self, bus: &SignalBus) -> bool {
        bus.get(Signal::Compt) && !bus.get(Signal::Busy) && !bus.get(Signal::TrReq)
    }

    pub fn validate_valid_off(&self, bus: &SignalBus) -> bool {
        !bus.get(Signal::Valid)
    }

    fn should_transition_idle_unavbl(&self, bus: &SignalBus) -> bool {
        !bus.get(Signal::LptReady(self.port))
    }

    /// Mirrors `can_auto_recover`'s branching on operation type and
    /// current state exactly (original_source state_machine.py).
    pub fn can_auto_recover(&self, bus: &SignalBus) -> bool {
        let ready = bus.get(Signal::LptReady(self.port));
        let error = bus.get(Signal::LptError(self.port));
        let valid = bus.get(Signal::Valid);

        match self.operation {
            None => match self.state {
                HandshakeState::HoUnavbl | HandshakeState::IdleUnavbl => ready && !error,
                HandshakeState::ErrorHandling => !error && ready,
                _ => false,
            },
            Some(_) => match self.state {
                HandshakeState::HoUnavbl | HandshakeState::IdleUnavbl => ready && !valid,
                HandshakeState::ErrorHandling => !error && ready && !valid,
                _ => false,
            },
        }
    }

    pub fn can_return_to_idle(&self, bus: &SignalBus) -> bool {
        bus.get(Signal::LptReady(self.port)) && !bus.get(Signal::LptError(self.port))
    }

    // ------------------------------------------------------------------
    // Transition plumbing.
    // ------------------------------------------------------------------

    fn transition(
        &mut self,
        trigger: &'static str,
        dest: HandshakeState,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        let old = self.state;
        self.timer.cancel();
        self.state = dest;
        self.on_enter(dest, bus, adapter);
        if let Some((name, duration)) = dest.timer() {
            self.timer.arm(name, duration);
        }
        self.transitions.push(TransitionRecord { old, new: dest, trigger });
        tracing::info!(port = %self.port, from = ?old, to = ?dest, trigger, "handshake transition");
    }

    fn on_enter(&mut self, state: HandshakeState, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        match state {
            HandshakeState::Idle => {
                self.operation = None;
                self.transitions.clear();
                bus.set(Signal::UReq, false);
                bus.set(Signal::LReq, false);
                bus.set(Signal::Ready, false);
            }
            HandshakeState::HandshakeInitiated => {
                if adapter.load_ready(bus) {
                    bus.set(Signal::LReq, true);
                    bus.set(Signal::UReq, false);
                    self.operation = Some(Operation::Load);
                } else if adapter.unload_ready(bus) {
                    bus.set(Signal::UReq, true);
                    bus.set(Signal::LReq, false);
                    self.operation = Some(Operation::Unload);
                }
            }
            HandshakeState::TrReqOn => {
                // Original immediately attempts the next transition from
                // its own on_enter hook; the guard protects against
                // firing before READY is actually warranted.
                self.ready_for_transfer(bus, adapter);
            }
            HandshakeState::TransferReady => {
                bus.set(Signal::Ready, true);
            }
            HandshakeState::Busy | HandshakeState::CarrierDetected => {}
            HandshakeState::TransferCompleted => {
                bus.set(Signal::Ready, false);
            }
            HandshakeState::IdleUnavbl => {
                bus.set(Signal::UReq, false);
                bus.set(Signal::LReq, false);
                bus.set(Signal::Ready, false);
            }
            HandshakeState::HoUnavbl => {
                bus.set(Signal::HoAvbl, false);
            }
            HandshakeState::ErrorHandling | HandshakeState::Timeout => {
                bus.set(Signal::Ready, false);
                bus.set(Signal::LReq, false);
                bus.set(Signal::UReq, false);
            }
            HandshakeState::ErrorRecovery => {}
            HandshakeState::Reset => {
                bus.reset_passive();
            }
        }
    }

    // ------------------------------------------------------------------
    // Triggers. Each is a no-op (logged) outside its source state(s) or
    // when its guard fails: an invalid trigger or guard failure is
    // absorbed, not propagated.
    // ------------------------------------------------------------------

    fn refuse(&self, trigger: &'static str, reason: &'static str) {
        tracing::debug!(port = %self.port, trigger, state = ?self.state, reason, "handshake trigger refused");
    }

    pub fn start_handshake(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::Idle {
            return self.refused("start_handshake");
        }
        if !self.can_start_handshake(bus, adapter) {
            return self.refused_guard("start_handshake");
        }
        self.transition("start_handshake", HandshakeState::HandshakeInitiated, bus, adapter);
        true
    }

    pub fn tr_req_received(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::HandshakeInitiated {
            return self.refused("tr_req_received");
        }
        if !self.validate_tr_req(bus) {
            return self.refused_guard("tr_req_received");
        }
        self.transition("tr_req_received", HandshakeState::TrReqOn, bus, adapter);
        true
    }

    pub fn ready_for_transfer(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::TrReqOn {
            return self.refused("ready_for_transfer");
        }
        if !self.validate_ready(bus, adapter) {
            return self.refused_guard("ready_for_transfer");
        }
        self.transition("ready_for_transfer", HandshakeState::TransferReady, bus, adapter);
        true
    }

    pub fn busy_on(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::TransferReady {
            return self.refused("busy_on");
        }
        if !self.validate_busy_conditions(bus) {
            return self.refused_guard("busy_on");
        }
        self.transition("busy_on", HandshakeState::Busy, bus, adapter);
        true
    }

    pub fn carrier_detected_event(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::Busy {
            return self.refused("carrier_detected_event");
        }
        if !self.validate_carrier_detected(bus) {
            return self.refused_guard("carrier_detected_event");
        }
        self.transition("carrier_detected_event", HandshakeState::CarrierDetected, bus, adapter);
        true
    }

    pub fn transfer_done(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::CarrierDetected {
            return self.refused("transfer_done");
        }
        if !self.transfer_complete(bus) {
            return self.refused_guard("transfer_done");
        }
        self.transition("transfer_done", HandshakeState::TransferCompleted, bus, adapter);
        true
    }

    pub fn transfer_completed(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::TransferCompleted {
            return self.refused("transfer_completed");
        }
        if !self.validate_valid_off(bus) {
            return self.refused_guard("transfer_completed");
        }
        self.transition("transfer_completed", HandshakeState::Idle, bus, adapter);
        true
    }

    /// `return_idle`: source `TRANSFER_COMPLETED`, guarded by
    /// `can_return_to_idle` rather than `validate_valid_off`: a second,
    /// independent way back to `IDLE` available to external callers (the
    /// arbiter never needs it during a live handshake, but it is part of
    /// the named trigger set).
    pub fn return_idle(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::TransferCompleted {
            return self.refused("return_idle");
        }
        if !self.can_return_to_idle(bus) {
            return self.refused_guard("return_idle");
        }
        self.transition("return_idle", HandshakeState::Idle, bus, adapter);
        true
    }

    /// `to_IDLE_UNAVBL`: source `[IDLE, HO_UNAVBL, ERROR_HANDLING]`,
    /// guarded by `should_transition_idle_unavbl`.
    pub fn to_idle_unavbl(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if !matches!(
            self.state,
            HandshakeState::Idle | HandshakeState::HoUnavbl | HandshakeState::ErrorHandling
        ) {
            return self.refused("to_idle_unavbl");
        }
        if !self.should_transition_idle_unavbl(bus) {
            return self.refused_guard("to_idle_unavbl");
        }
        self.transition("to_idle_unavbl", HandshakeState::IdleUnavbl, bus, adapter);
        true
    }

    /// `to_HO_UNAVBL`: source `*`, unconditional.
    pub fn to_ho_unavbl(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        self.transition("to_ho_unavbl", HandshakeState::HoUnavbl, bus, adapter);
        true
    }

    /// `ho_avbl_return_idle`: source `HO_UNAVBL`, guarded by
    /// `can_auto_recover`.
    pub fn ho_avbl_return_idle(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::HoUnavbl {
            return self.refused("ho_avbl_return_idle");
        }
        if !self.can_auto_recover(bus) {
            return self.refused_guard("ho_avbl_return_idle");
        }
        self.transition("ho_avbl_return_idle", HandshakeState::Idle, bus, adapter);
        true
    }

    /// `idle_unavbl_return_idle`: source `IDLE_UNAVBL`, guarded by
    /// `can_return_to_idle`.
    pub fn idle_unavbl_return_idle(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::IdleUnavbl {
            return self.refused("idle_unavbl_return_idle");
        }
        if !self.can_return_to_idle(bus) {
            return self.refused_guard("idle_unavbl_return_idle");
        }
        self.transition("idle_unavbl_return_idle", HandshakeState::Idle, bus, adapter);
        true
    }

    /// `to_ERROR_HANDLING`: source `*`, unconditional.
    pub fn to_error_handling(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        self.transition("to_error_handling", HandshakeState::ErrorHandling, bus, adapter);
        true
    }

    /// `attempt_recovery`: source `ERROR_HANDLING`, guarded by
    /// `can_auto_recover`.
    pub fn attempt_recovery(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::ErrorHandling {
            return self.refused("attempt_recovery");
        }
        if !self.can_auto_recover(bus) {
            return self.refused_guard("attempt_recovery");
        }
        self.transition("attempt_recovery", HandshakeState::Idle, bus, adapter);
        true
    }

    /// `to_ERROR_RECOVERY`: source `ERROR_HANDLING`, unconditional.
    pub fn to_error_recovery(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if self.state != HandshakeState::ErrorHandling {
            return self.refused("to_error_recovery");
        }
        self.transition("to_error_recovery", HandshakeState::ErrorRecovery, bus, adapter);
        true
    }

    /// `to_TIMEOUT`: source any in-progress handshake state, unconditional,
    /// lands in `TIMEOUT` (see DESIGN.md: the original's transition table
    /// sends this trigger straight to `ERROR_RECOVERY` instead, treated
    /// here as a defect rather than intended behavior).
    pub fn to_timeout(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
        if !self.state.is_handshake() {
            return self.refused("to_timeout");
        }
        self.transition("to_timeout", HandshakeState::Timeout, bus, adapter);
        true
    }

    fn to_error_recovery_from_timeout(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        self.to_timeout(bus, adapter);
    }

    /// `reset`: source `*`, unconditional, always lands in `IDLE`.
    pub fn reset(&mut self, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        self.transition("reset", HandshakeState::Idle, bus, adapter);
    }

    fn refused(&self, trigger: &'static str) -> bool {
        self.refuse(trigger, "invalid source state");
        false
    }

    fn refused_guard(&self, trigger: &'static str) -> bool {
        self.refuse(trigger, "guard failed");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::adapter::ParallelAdapter;

    fn setup(port: Port) -> (HandshakeMachine, SignalBus, ParallelAdapter) {
        (HandshakeMachine::new(port), SignalBus::new(), ParallelAdapter::new(port))
    }

    #[test]
    fn happy_path_load_cycle() {
        let (mut m, mut bus, a) = setup(Port::P0);
        bus.set(Signal::Cs0, true);
        bus.set(Signal::HoAvbl, true);
        assert!(m.start_handshake(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::HandshakeInitiated);
        assert!(bus.get(Signal::LReq), "empty ready port requests LOAD");

        bus.set(Signal::Valid, true);
        bus.set(Signal::TrReq, true);
        assert!(m.tr_req_received(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::TrReqOn);
        // on_enter(TrReqOn) immediately tries ready_for_transfer.
        assert_eq!(m.state(), HandshakeState::TransferReady);
        assert!(bus.get(Signal::Ready));

        bus.set(Signal::Busy, true);
        assert!(m.busy_on(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::Busy);

        bus.set(Signal::CarrierPresent(Port::P0), true);
        assert!(m.carrier_detected_event(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::CarrierDetected);

        bus.set(Signal::Busy, false);
        bus.set(Signal::TrReq, false);
        bus.set(Signal::Compt, true);
        assert!(m.transfer_done(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::TransferCompleted);
        assert!(!bus.get(Signal::Ready));

        bus.set(Signal::Valid, false);
        assert!(m.transfer_completed(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::Idle);
        assert_eq!(m.operation(), None);
    }

    #[test]
    fn start_handshake_refused_when_extra_active_signal_is_on() {
        let (mut m, mut bus, a) = setup(Port::P0);
        bus.set(Signal::Busy, true);
        assert!(!m.start_handshake(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::Idle);
    }

    #[test]
    fn to_ho_unavbl_is_unconditional_from_any_state() {
        let (mut m, mut bus, a) = setup(Port::P1);
        bus.set(Signal::Cs1, true);
        m.start_handshake(&mut bus, &a);
        assert!(m.to_ho_unavbl(&mut bus, &a));
        assert_eq!(m.state(), HandshakeState::HoUnavbl);
        assert!(!bus.get(Signal::HoAvbl));
    }

    #[test]
    fn timeout_escalates_to_timeout_state() {
        let (mut m, mut bus, a) = setup(Port::P0);
        bus.set(Signal::Cs0, true);
        m.start_handshake(&mut bus, &a);
        assert_eq!(m.state(), HandshakeState::HandshakeInitiated);
        m.timer.arm("TP1", std::time::Duration::from_millis(1));
        std::thread::sleep(std::time::Duration::from_millis(5));
        m.poll_timeout(&mut bus, &a);
        assert_eq!(m.state(), HandshakeState::Timeout);
        assert!(!bus.get(Signal::Ready));
        assert!(!bus.get(Signal::LReq));
        assert!(!bus.get(Signal::UReq));
    }

    #[test]
    fn carrier_detected_guard_depends_on_operation() {
        let (mut m, bus, _a) = setup(Port::P0);
        assert!(!m.validate_carrier_detected(&bus), "no operation means no match");
    }
}
