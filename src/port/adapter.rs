//! Load-Port Adapter.
//!
//! Two variants share one contract: [`ParallelAdapter`] is a pure view over
//! the [`SignalBus`]; [`crate::port::ascii::AsciiAdapter`] additionally owns
//! a command/response dialect to a serial load-port controller. The core
//! (handshake machine, arbiter, controller) only ever talks to the
//! `LoadPortAdapter` trait, so it treats both uniformly. Grounded in
//! original_source/load_port.py's `LoadPort` / `PortStatus`.

use crate::signal::bus::SignalBus;
use crate::signal::names::{Port, Signal};

/// The physical state of one port's four hardware inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus {
    pub port: Port,
    pub carrier_present: bool,
    pub latch_locked: bool,
    pub lpt_ready: bool,
    pub lpt_error: bool,
}

impl PortStatus {
    pub fn is_ready_for_load(&self) -> bool {
        !self.carrier_present && !self.latch_locked && !self.lpt_error && self.lpt_ready
    }

    pub fn is_ready_for_unload(&self) -> bool {
        self.carrier_present && !self.latch_locked && !self.lpt_error && self.lpt_ready
    }
}

/// The capability set the core consumes uniformly across adapter variants.
pub trait LoadPortAdapter: Send {
    fn port(&self) -> Port;

    /// Reads all four hardware inputs for this port off the bus.
    fn status(&self, bus: &SignalBus) -> PortStatus {
        let port = self.port();
        PortStatus {
            port,
            carrier_present: bus.get(Signal::CarrierPresent(port)),
            latch_locked: bus.get(Signal::LatchLocked(port)),
            lpt_ready: bus.get(Signal::LptReady(port)),
            lpt_error: bus.get(Signal::LptError(port)),
        }
    }

    fn load_ready(&self, bus: &SignalBus) -> bool {
        self.status(bus).is_ready_for_load()
    }

    fn unload_ready(&self, bus: &SignalBus) -> bool {
        self.status(bus).is_ready_for_unload()
    }

    fn ho_available(&self, bus: &SignalBus) -> bool {
        let s = self.status(bus);
        s.lpt_ready && !s.lpt_error
    }

    /// Restores the per-port defaults (ready=true, others=false) through
    /// the bus.
    fn reset(&self, bus: &mut SignalBus) {
        let port = self.port();
        bus.set(Signal::CarrierPresent(port), false);
        bus.set(Signal::LatchLocked(port), false);
        bus.set(Signal::LptError(port), false);
        bus.set(Signal::LptReady(port), true);
    }
}

/// Pure view over the Signal Bus: used in production (DIO-backed LPT
/// inputs, mirrored by the I/O Bridge) and simulation modes.
pub struct ParallelAdapter {
    port: Port,
}

impl ParallelAdapter {
    pub fn new(port: Port) -> Self {
        Self { port }
    }
}

impl LoadPortAdapter for ParallelAdapter {
    fn port(&self) -> Port {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_ready_requires_empty_unlocked_error_free_ready_port() {
        let mut bus = SignalBus::new();
        let adapter = ParallelAdapter::new(Port::P0);
        assert!(adapter.load_ready(&bus), "defaults are load-ready");

        bus.set(Signal::CarrierPresent(Port::P0), true);
        assert!(!adapter.load_ready(&bus));
        assert!(adapter.unload_ready(&bus));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut bus = SignalBus::new();
        let adapter = ParallelAdapter::new(Port::P1);
        bus.set(Signal::CarrierPresent(Port::P1), true);
        bus.set(Signal::LptReady(Port::P1), false);
        bus.set(Signal::LptError(Port::P1), true);
        adapter.reset(&mut bus);
        let status = adapter.status(&bus);
        assert!(!status.carrier_present);
        assert!(!status.latch_locked);
        assert!(!status.lpt_error);
        assert!(status.lpt_ready);
    }
}
