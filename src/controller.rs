//! Controller: owns both ports' handshake machines, the
//! arbiter, and the Signal Bus, and drives them from signal edges.
//!
//! Grounded in original_source/e84_controller.py's `E84Controller`. The
//! original wires `SignalManager` watchers directly back into controller
//! methods (`_handle_valid_change`, `poll_cycle`, ...), a self-referential
//! callback graph that does not translate directly into Rust's ownership
//! model. Here the controller instead detects the same edges explicitly
//! at the top of [`Controller::step`] and dispatches them in the same
//! order the original's watchers would fire, which keeps the behavior
//! while avoiding a `Rc<RefCell<_>>` cycle just to replay dynamic callback
//! wiring.

use crate::arbiter::Arbiter;
use crate::handshake::machine::HandshakeMachine;
use crate::handshake::state::HandshakeState;
use crate::port::adapter::LoadPortAdapter;
use crate::port::condition::PortCondition;
use crate::signal::bus::SignalBus;
use crate::signal::names::{Port, Signal};

/// The handful of signals the controller edge-detects every step, outside
/// whatever the handshake machine itself reads on demand.
#[derive(Debug, Clone, Copy)]
struct Watched {
    valid: bool,
    ho_avbl: bool,
    ready: [bool; 2],
    error: [bool; 2],
    carrier: [bool; 2],
}

impl Watched {
    fn capture(bus: &SignalBus) -> Self {
        Self {
            valid: bus.get(Signal::Valid),
            ho_avbl: bus.get(Signal::HoAvbl),
            ready: [
                bus.get(Signal::LptReady(Port::P0)),
                bus.get(Signal::LptReady(Port::P1)),
            ],
            error: [
                bus.get(Signal::LptError(Port::P0)),
                bus.get(Signal::LptError(Port::P1)),
            ],
            carrier: [
                bus.get(Signal::CarrierPresent(Port::P0)),
                bus.get(Signal::CarrierPresent(Port::P1)),
            ],
        }
    }

    fn condition(&self, port: Port) -> PortCondition {
        let i = port.index();
        PortCondition::new(port, self.ready[i], self.error[i], self.carrier[i], self.valid, self.ho_avbl)
    }
}

pub struct Controller {
    bus: SignalBus,
    machines: [HandshakeMachine; 2],
    adapters: [Box<dyn LoadPortAdapter>; 2],
    arbiter: Arbiter,
    selected_port: Option<Port>,
    prev: Watched,
}

impl Controller {
    pub fn new(adapters: [Box<dyn LoadPortAdapter>; 2]) -> Self {
        let bus = SignalBus::new();
        let prev = Watched::capture(&bus);
        Self {
            bus,
            machines: [HandshakeMachine::new(Port::P0), HandshakeMachine::new(Port::P1)],
            adapters,
            arbiter: Arbiter::new(),
            selected_port: None,
            prev,
        }
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SignalBus {
        &mut self.bus
    }

    pub fn machine(&self, port: Port) -> &HandshakeMachine {
        &self.machines[port.index()]
    }

    pub fn selected_port(&self) -> Option<Port> {
        self.selected_port
    }

    /// Selects the active port from `CS_0`/`CS_1`. Both lines asserted at once selects neither.
    /// Flags the selected port's machine unavailable if its actual
    /// hand-off readiness disagrees with the bus's `HO_AVBL` value.
    pub fn select_port(&mut self) -> Option<Port> {
        let ho_avbl = self.bus.get(Signal::HoAvbl);
        let cs0 = self.bus.get(Signal::Cs0);
        let cs1 = self.bus.get(Signal::Cs1);

        self.selected_port = if cs0 && cs1 {
            None
        } else if cs0 {
            Some(Port::P0)
        } else if cs1 {
            Some(Port::P1)
        } else {
            None
        };

        if let Some(port) = self.selected_port {
            let i = port.index();
            let is_ready = self.adapters[i].ho_available(&self.bus);
            if is_ready != ho_avbl {
                self.machines[i].to_ho_unavbl(&mut self.bus, self.adapters[i].as_ref());
            }
        }

        self.selected_port
    }

    /// Sets `HO_AVBL` false when *both* ports are in error or not-ready.
    pub fn check_global_unavailable(&mut self) -> bool {
        let error0 = self.bus.get(Signal::LptError(Port::P0));
        let error1 = self.bus.get(Signal::LptError(Port::P1));
        let ready0 = self.bus.get(Signal::LptReady(Port::P0));
        let ready1 = self.bus.get(Signal::LptReady(Port::P1));

        let unavailable = (error0 || !ready0) && (error1 || !ready1);
        self.bus.set(Signal::HoAvbl, !unavailable);
        unavailable
    }

    /// Resets both ports' adapters and handshake machines and the bus to
    /// their defaults.
    pub fn full_reset(&mut self) {
        for i in 0..2 {
            self.adapters[i].reset(&mut self.bus);
            self.machines[i].reset(&mut self.bus, self.adapters[i].as_ref());
        }
        self.bus.reset_all();
        self.selected_port = None;
    }

    /// Advances the currently selected port's machine along the happy
    /// path lookup table. A no-op if no port
    /// is selected or `VALID` is low.
    fn poll_handshake(&mut self) {
        let Some(port) = self.selected_port else { return };
        let i = port.index();
        let bus = &mut self.bus;
        let adapter = self.adapters[i].as_ref();
        let machine = &mut self.machines[i];

        // TRANSFER_COMPLETED's own trigger is guarded on VALID being low
        // (the AGV's cue that the handshake is over), the reverse of every
        // other in-progress state below, so it is checked ahead of the
        // blanket VALID gate rather than inside it.
        if machine.state() == HandshakeState::TransferCompleted {
            machine.transfer_completed(bus, adapter);
            return;
        }

        if !bus.get(Signal::Valid) {
            return;
        }

        match machine.state() {
            HandshakeState::Idle => {
                machine.start_handshake(bus, adapter);
            }
            HandshakeState::HandshakeInitiated => {
                if bus.get(Signal::TrReq) {
                    machine.tr_req_received(bus, adapter);
                }
            }
            HandshakeState::TrReqOn => {
                // READY is only ever set true by this same trigger's own
                // on-enter action, so it cannot be the retry condition;
                // re-poll the load port's own readiness instead.
                let status = adapter.status(bus);
                if status.lpt_ready && !status.lpt_error {
                    machine.ready_for_transfer(bus, adapter);
                }
            }
            HandshakeState::TransferReady => {
                if bus.get(Signal::Busy) {
                    machine.busy_on(bus, adapter);
                }
            }
            HandshakeState::Busy => {
                if machine.validate_carrier_detected(bus) {
                    machine.carrier_detected_event(bus, adapter);
                }
            }
            HandshakeState::CarrierDetected => {
                if bus.get(Signal::Compt) {
                    machine.transfer_done(bus, adapter);
                }
            }
            _ => {}
        }
    }

    /// Checks both ports' `TPn` timers, escalating either machine that has
    /// timed out.
    fn poll_timeouts(&mut self) {
        for i in 0..2 {
            let bus = &mut self.bus;
            let adapter = self.adapters[i].as_ref();
            self.machines[i].poll_timeout(bus, adapter);
        }
    }

    /// Routes any edge on the watched signals to the handshake machine or
    /// the arbiter, whichever owns it while `VALID` is in its current
    /// state (original_source `_handle_valid_change` / `ErrorTransitionHandler`
    /// watchers).
    ///
    /// Two distinct mechanisms, never the same pass: on the `VALID`
    /// true->false edge, post-handshake cleanup routes each port by its
    /// current condition alone (`run_post_handshake_cleanup`); on any
    /// other edge, the `(old_state, new_state)` diff table below handles
    /// it, including the SELECTED-degrade row, which fires while `VALID`
    /// is still on.
    fn route_edges(&mut self, before: Watched, after: Watched) {
        if !before.valid && after.valid {
            self.select_port();
            return;
        }
        if before.valid && !after.valid {
            self.bus.set(Signal::HoAvbl, true);
            self.run_post_handshake_cleanup();
            return;
        }

        for port in Port::ALL {
            let i = port.index();
            let old_condition = before.condition(port);
            let new_condition = after.condition(port);
            if old_condition.state() == new_condition.state() {
                continue;
            }
            let (left, right) = self.machines.split_at_mut(1);
            let (machine, other_machine) = if i == 0 {
                (&mut left[0], &mut right[0])
            } else {
                (&mut right[0], &mut left[0])
            };
            let other_port = port.other();
            self.arbiter.handle_signal_change(
                port,
                old_condition,
                new_condition,
                machine,
                other_machine,
                &mut self.bus,
                self.adapters[i].as_ref(),
                self.adapters[other_port.index()].as_ref(),
                self.selected_port,
            );
        }
    }

    /// Post-handshake cleanup: on the `VALID` true->false edge, routes
    /// each port by its current (post-drop) condition alone, independent
    /// of whatever its condition was a moment before. `HO_AVBL` is set
    /// true by the caller first, so this reads it back post-set.
    fn run_post_handshake_cleanup(&mut self) {
        for port in Port::ALL {
            let i = port.index();
            let condition = PortCondition::new(
                port,
                self.bus.get(Signal::LptReady(port)),
                self.bus.get(Signal::LptError(port)),
                self.bus.get(Signal::CarrierPresent(port)),
                self.bus.get(Signal::Valid),
                self.bus.get(Signal::HoAvbl),
            );
            self.arbiter.post_handshake_cleanup(
                condition,
                &mut self.machines[i],
                &mut self.bus,
                self.adapters[i].as_ref(),
            );
        }
    }

    /// One full controller tick: called after the I/O Bridge has applied
    /// whatever hardware edges it observed this period. Captures the
    /// watched signals, routes any edges, advances the active handshake,
    /// and checks timers: the composition of `_handle_valid_change`,
    /// `ErrorTransitionHandler`'s watchers, `poll_cycle`, and the timeout
    /// check into one deterministic step.
    pub fn step(&mut self) {
        let after = Watched::capture(&self.bus);
        let before = self.prev;
        if before.valid != after.valid
            || before.ready != after.ready
            || before.error != after.error
            || before.carrier != after.carrier
            || before.ho_avbl != after.ho_avbl
        {
            self.route_edges(before, after);
        }
        self.check_global_unavailable();
        self.poll_handshake();
        self.poll_timeouts();
        self.prev = Watched::capture(&self.bus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::adapter::ParallelAdapter;

    fn controller() -> Controller {
        Controller::new([
            Box::new(ParallelAdapter::new(Port::P0)),
            Box::new(ParallelAdapter::new(Port::P1)),
        ])
    }

    #[test]
    fn select_port_prefers_neither_when_both_cs_lines_active() {
        let mut c = controller();
        c.bus_mut().set(Signal::Cs0, true);
        c.bus_mut().set(Signal::Cs1, true);
        assert_eq!(c.select_port(), None);
    }

    #[test]
    fn full_handshake_drives_through_step() {
        let mut c = controller();
        c.bus_mut().set(Signal::Cs0, true);
        c.bus_mut().set(Signal::Valid, true);
        c.step();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::HandshakeInitiated);

        c.bus_mut().set(Signal::TrReq, true);
        c.step();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::TransferReady);

        c.bus_mut().set(Signal::Busy, true);
        c.step();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::Busy);

        c.bus_mut().set(Signal::CarrierPresent(Port::P0), true);
        c.step();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::CarrierDetected);

        c.bus_mut().set(Signal::Busy, false);
        c.bus_mut().set(Signal::TrReq, false);
        c.bus_mut().set(Signal::Compt, true);
        c.step();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::TransferCompleted);

        c.bus_mut().set(Signal::Valid, false);
        c.step();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::Idle);
    }

    #[test]
    fn check_global_unavailable_clears_ho_avbl_when_both_ports_bad() {
        let mut c = controller();
        c.bus_mut().set(Signal::LptError(Port::P0), true);
        c.bus_mut().set(Signal::LptError(Port::P1), true);
        assert!(c.check_global_unavailable());
        assert!(!c.bus().get(Signal::HoAvbl));
    }

    #[test]
    fn full_reset_returns_everything_to_defaults() {
        let mut c = controller();
        c.bus_mut().set(Signal::Cs0, true);
        c.bus_mut().set(Signal::Valid, true);
        c.step();
        c.full_reset();
        assert_eq!(c.machine(Port::P0).state(), HandshakeState::Idle);
        assert_eq!(c.selected_port(), None);
        assert!(c.bus().get(Signal::HoAvbl));
    }
}
