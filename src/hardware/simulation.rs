//! Simulated hardware interface.
//!
//! Plays the part of both the AGV and the two load ports: reacts to the
//! passive outputs this controller drives by working a handshake forward
//! on its own `tick`, the way a real AGV/load-port pair would. Grounded in
//! original_source/hardware_interface.py's `SimulatedDioHardwareInterface`.

use std::collections::HashMap;

use rand::Rng;

use crate::error::Result;
use crate::hardware::HardwareInterface;
use crate::signal::names::{Port, Signal};

/// Tunables from "simulation parameters".
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub auto_respond: bool,
    pub random_errors: bool,
    pub error_rate: f64,
    pub initial_states: HashMap<Signal, bool>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            auto_respond: true,
            random_errors: false,
            error_rate: 0.05,
            initial_states: HashMap::new(),
        }
    }
}

pub struct SimulatedHardware {
    config: SimulationConfig,
    state: HashMap<Signal, bool>,
}

impl SimulatedHardware {
    pub fn new(config: SimulationConfig) -> Self {
        let mut state: HashMap<Signal, bool> =
            Signal::ALL.iter().map(|&s| (s, s.default_value())).collect();
        for (&signal, &value) in &config.initial_states {
            state.insert(signal, value);
        }
        Self { config, state }
    }

    fn get(&self, signal: Signal) -> bool {
        self.state.get(&signal).copied().unwrap_or(false)
    }

    fn set(&mut self, signal: Signal, value: bool) {
        self.state.insert(signal, value);
    }

    /// Advances the simulation by one poll period: reacts to the current
    /// passive outputs by driving active-side inputs forward, and
    /// optionally injects a random load-port error. Called by the I/O
    /// Bridge's polling worker once per period, before it reads inputs.
    pub fn tick(&mut self) {
        if self.config.auto_respond {
            self.simulate_auto_responses();
        }
        if self.config.random_errors {
            self.simulate_random_error();
        }
    }

    fn simulate_auto_responses(&mut self) {
        let mut rng = rand::thread_rng();

        if self.get(Signal::LReq) && rng.gen_bool(0.1) {
            if !self.get(Signal::Valid) {
                self.set(Signal::Valid, true);
                self.set(Signal::Cs0, true);
            } else if !self.get(Signal::TrReq) {
                self.set(Signal::TrReq, true);
            }
        }

        if self.get(Signal::Ready) && self.get(Signal::TrReq) && !self.get(Signal::Busy) && rng.gen_bool(0.1) {
            self.set(Signal::Busy, true);
        }

        if self.get(Signal::Busy) && rng.gen_bool(0.05) {
            self.set(Signal::Compt, true);
            self.set(Signal::Busy, false);
        }

        if self.get(Signal::Compt) && !self.get(Signal::Ready) && !self.get(Signal::TrReq) && rng.gen_bool(0.1) {
            self.set(Signal::Compt, false);
            self.set(Signal::Valid, false);
            self.set(Signal::Cs0, false);
            self.set(Signal::Cs1, false);
        }
    }

    fn simulate_random_error(&mut self) {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.config.error_rate) {
            return;
        }
        let port = if rng.gen_bool(0.5) { Port::P0 } else { Port::P1 };
        let signal = Signal::LptError(port);
        let current = self.get(signal);
        self.set(signal, !current);
    }
}

impl HardwareInterface for SimulatedHardware {
    fn read_input(&mut self, signal: Signal) -> Result<bool> {
        Ok(self.get(signal))
    }

    fn write_output(&mut self, signal: Signal, value: bool) -> Result<()> {
        self.set(signal, value);
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}
