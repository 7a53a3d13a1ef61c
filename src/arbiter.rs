//! Port-Condition Arbiter.
//!
//! Two distinct mechanisms, kept apart deliberately: `post_handshake_cleanup`
//! fires once on the VALID true->false edge and routes each port by its
//! current condition alone; `handle_signal_change` dispatches an
//! `(old_state, new_state)` diff for error/ready/ho_avbl edges, reachable
//! both while VALID is steady-false and, for the SELECTED-degrade row,
//! while VALID is still on mid-handshake. Grounded in
//! original_source/port_states.py's `ErrorTransitionHandler`, whose
//! `(PortState, PortState)` keyed `state_transitions` map is reproduced here
//! as an explicit match.

use crate::handshake::machine::HandshakeMachine;
use crate::port::adapter::LoadPortAdapter;
use crate::port::condition::{PortCondition, PortState};
use crate::signal::bus::SignalBus;
use crate::signal::names::Port;

fn ready_and_error_clear(bus: &SignalBus, adapter: &dyn LoadPortAdapter) -> bool {
    let status = adapter.status(bus);
    status.lpt_ready && !status.lpt_error
}

/// Stateless dispatcher: all state lives in the [`HandshakeMachine`]s it is
/// handed.
pub struct Arbiter;

impl Arbiter {
    pub fn new() -> Self {
        Self
    }

    /// Main entry point (original_source `handle_signal_change`). A no-op
    /// if the condition's derived [`PortState`] did not actually change;
    /// otherwise dispatches to the matching `(old, new)` handler, logging
    /// and ignoring any pair with no handler.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_signal_change(
        &self,
        port: Port,
        old: PortCondition,
        new: PortCondition,
        machine: &mut HandshakeMachine,
        other_machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
        other_adapter: &dyn LoadPortAdapter,
        active_port: Option<Port>,
    ) {
        let old_state = old.state();
        let new_state = new.state();
        if old_state == new_state {
            return;
        }

        let valid = new.valid;
        tracing::debug!(?port, from = ?old_state, to = ?new_state, "port condition transition");

        use PortState::*;
        match (old_state, new_state) {
            (Selected, HoOff) | (Selected, Error) | (Selected, NotReady) => {
                self.selected_to_degraded(valid, machine, bus, adapter)
            }
            (HoOff, Available) => self.ho_off_to_available(valid, machine, bus, adapter),
            (HoOff, Error) => self.ho_off_to_error(machine, bus, adapter),
            (HoOff, NotReady) => self.ho_off_to_not_ready(machine, bus, adapter),
            (Error, Available) => self.error_to_available(valid, machine, bus, adapter),
            (Error, NotReady) => self.error_to_not_ready(valid, machine, bus, adapter),
            (Error, HoOff) => self.error_to_ho_off(machine, other_machine, bus, adapter, other_adapter),
            (NotReady, Available) => self.not_ready_to_available(valid, machine, bus, adapter),
            (NotReady, Error) => self.not_ready_to_error(machine, bus, adapter),
            (NotReady, HoOff) => self.not_ready_to_ho_off(machine, other_machine, bus, adapter, other_adapter),
            (Available, Error) => self.available_to_error(valid, machine, bus, adapter),
            (Available, NotReady) => self.available_to_not_ready(machine, bus, adapter),
            (Available, HoOff) => {
                self.available_to_ho_off(valid, port, active_port, machine, bus, adapter)
            }
            _ => tracing::warn!(from = ?old_state, to = ?new_state, "unhandled port condition transition"),
        }
    }

    /// Post-handshake cleanup: on the `VALID` true->false edge, for each
    /// port, route by its current condition alone (not an old/new diff).
    /// `HO_OFF` is left as-is; `ERROR` goes to `ERROR_HANDLING`; `NOT_READY`
    /// goes to `IDLE_UNAVBL`; anything else returns to `IDLE` if the
    /// machine isn't there already.
    pub fn post_handshake_cleanup(
        &self,
        condition: PortCondition,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        match condition.state() {
            PortState::HoOff => {}
            PortState::Error => {
                machine.to_error_handling(bus, adapter);
            }
            PortState::NotReady => {
                machine.to_idle_unavbl(bus, adapter);
            }
            PortState::Selected | PortState::Unselected | PortState::Available => {
                machine.transfer_completed(bus, adapter);
            }
        }
    }

    fn selected_to_degraded(
        &self,
        valid: bool,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        if !valid {
            if machine.state() == crate::handshake::state::HandshakeState::HoUnavbl
                && ready_and_error_clear(bus, adapter)
            {
                machine.attempt_recovery(bus, adapter);
            }
        } else {
            machine.to_ho_unavbl(bus, adapter);
        }
    }

    fn ho_off_to_available(
        &self,
        valid: bool,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        if !valid
            && machine.state() == crate::handshake::state::HandshakeState::HoUnavbl
            && ready_and_error_clear(bus, adapter)
        {
            machine.ho_avbl_return_idle(bus, adapter);
        }
    }

    fn ho_off_to_error(&self, machine: &mut HandshakeMachine, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        let error = adapter.status(bus).lpt_error;
        if error && machine.state() == crate::handshake::state::HandshakeState::HoUnavbl {
            machine.to_error_handling(bus, adapter);
        }
    }

    fn ho_off_to_not_ready(&self, machine: &mut HandshakeMachine, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        let ready = adapter.status(bus).lpt_ready;
        if !ready && machine.state() == crate::handshake::state::HandshakeState::HoUnavbl {
            machine.to_idle_unavbl(bus, adapter);
        }
    }

    fn error_to_available(
        &self,
        valid: bool,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        if !valid && machine.state() == crate::handshake::state::HandshakeState::ErrorHandling {
            machine.attempt_recovery(bus, adapter);
        }
    }

    fn error_to_not_ready(
        &self,
        valid: bool,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        if !valid && machine.state() == crate::handshake::state::HandshakeState::ErrorHandling {
            machine.to_idle_unavbl(bus, adapter);
        }
    }

    /// The one handler that moves *both* ports: "symmetric
    /// both-ports-in-the-same-degraded-state" escalation.
    fn error_to_ho_off(
        &self,
        machine: &mut HandshakeMachine,
        other_machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
        other_adapter: &dyn LoadPortAdapter,
    ) {
        use crate::handshake::state::HandshakeState::ErrorHandling;
        if machine.state() == ErrorHandling && other_machine.state() == ErrorHandling {
            machine.to_ho_unavbl(bus, adapter);
            other_machine.to_ho_unavbl(bus, other_adapter);
        }
    }

    fn not_ready_to_available(
        &self,
        valid: bool,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        use crate::handshake::state::HandshakeState::{HoUnavbl, IdleUnavbl};
        if !valid {
            match machine.state() {
                IdleUnavbl => {
                    machine.idle_unavbl_return_idle(bus, adapter);
                }
                HoUnavbl => {
                    machine.ho_avbl_return_idle(bus, adapter);
                }
                _ => {}
            }
        }
    }

    fn not_ready_to_error(&self, machine: &mut HandshakeMachine, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        if machine.state() == crate::handshake::state::HandshakeState::IdleUnavbl {
            machine.to_error_handling(bus, adapter);
        }
    }

    fn not_ready_to_ho_off(
        &self,
        machine: &mut HandshakeMachine,
        other_machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
        other_adapter: &dyn LoadPortAdapter,
    ) {
        use crate::handshake::state::HandshakeState::IdleUnavbl;
        if machine.state() == IdleUnavbl && other_machine.state() == IdleUnavbl {
            machine.to_ho_unavbl(bus, adapter);
            other_machine.to_ho_unavbl(bus, other_adapter);
        }
    }

    fn available_to_error(
        &self,
        valid: bool,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        if !valid {
            machine.to_error_handling(bus, adapter);
        }
    }

    fn available_to_not_ready(&self, machine: &mut HandshakeMachine, bus: &mut SignalBus, adapter: &dyn LoadPortAdapter) {
        if machine.state() == crate::handshake::state::HandshakeState::Idle {
            machine.to_idle_unavbl(bus, adapter);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn available_to_ho_off(
        &self,
        valid: bool,
        port: Port,
        active_port: Option<Port>,
        machine: &mut HandshakeMachine,
        bus: &mut SignalBus,
        adapter: &dyn LoadPortAdapter,
    ) {
        let is_active = active_port == Some(port);
        if valid && is_active {
            machine.to_ho_unavbl(bus, adapter);
        }
        if !valid && adapter.status(bus).lpt_error {
            machine.to_ho_unavbl(bus, adapter);
        }
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::state::HandshakeState;
    use crate::port::adapter::ParallelAdapter;
    use crate::signal::names::Signal;

    fn condition(bus: &SignalBus, port: Port) -> PortCondition {
        PortCondition::new(
            port,
            bus.get(Signal::LptReady(port)),
            bus.get(Signal::LptError(port)),
            bus.get(Signal::CarrierPresent(port)),
            bus.get(Signal::Valid),
            bus.get(Signal::HoAvbl),
        )
    }

    #[test]
    fn both_ports_in_error_escalate_to_ho_unavbl() {
        let arbiter = Arbiter::new();
        let mut m0 = HandshakeMachine::new(Port::P0);
        let mut m1 = HandshakeMachine::new(Port::P1);
        let a0 = ParallelAdapter::new(Port::P0);
        let a1 = ParallelAdapter::new(Port::P1);
        let mut bus = SignalBus::new();

        bus.set(Signal::HoAvbl, false);
        let old0 = condition(&bus, Port::P0).with_ho_avbl(true).with_error(true);
        bus.set(Signal::HoAvbl, true);
        // Force both machines into ERROR_HANDLING directly for the test.
        m0.to_error_handling(&mut bus, &a0);
        m1.to_error_handling(&mut bus, &a1);

        let new0 = condition(&bus, Port::P0).with_ho_avbl(false);
        arbiter.handle_signal_change(Port::P0, old0, new0, &mut m0, &mut m1, &mut bus, &a0, &a1, None);

        assert_eq!(m0.state(), HandshakeState::HoUnavbl);
        assert_eq!(m1.state(), HandshakeState::HoUnavbl);
    }

    #[test]
    fn same_state_is_a_no_op() {
        let arbiter = Arbiter::new();
        let mut m0 = HandshakeMachine::new(Port::P0);
        let mut m1 = HandshakeMachine::new(Port::P1);
        let a0 = ParallelAdapter::new(Port::P0);
        let a1 = ParallelAdapter::new(Port::P1);
        let mut bus = SignalBus::new();
        let cond = condition(&bus, Port::P0);
        arbiter.handle_signal_change(Port::P0, cond, cond, &mut m0, &mut m1, &mut bus, &a0, &a1, None);
        assert_eq!(m0.state(), HandshakeState::Idle);
    }
}
