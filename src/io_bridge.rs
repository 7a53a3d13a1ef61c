//! I/O Bridge: the seam between the Signal Bus and a
//! [`HardwareInterface`]. Output mirroring is watcher-driven; input
//! polling runs on a dedicated worker thread, matching the original's
//! `threading.Thread`-per-worker model (original_source/main.py's
//! `hardware_monitor_thread`). Grounded in
//! original_source/hardware_interface.py's polling loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::hardware::HardwareInterface;
use crate::signal::bus::SignalBus;
use crate::signal::names::Signal;

/// The five signals this controller drives, mirrored to hardware on every
/// edge.
const PASSIVE_OUTPUTS: [Signal; 5] = [
    Signal::LReq,
    Signal::UReq,
    Signal::Ready,
    Signal::HoAvbl,
    Signal::Es,
];

/// Every signal the polling worker reads each period: the six active
/// inputs plus the per-port load-port inputs. Load-port inputs are included here only for the parallel
/// interface; the ASCII dialect (`port::ascii`) drives them itself and
/// is not polled through this path.
const ACTIVE_INPUTS: [Signal; 6] = [
    Signal::Cs0,
    Signal::Cs1,
    Signal::Valid,
    Signal::TrReq,
    Signal::Busy,
    Signal::Compt,
];

pub struct IoBridge {
    bus: Arc<Mutex<SignalBus>>,
    hardware: Arc<Mutex<Box<dyn HardwareInterface>>>,
    poll_period: Duration,
    poll_lpt_inputs: bool,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl IoBridge {
    pub fn new(
        bus: Arc<Mutex<SignalBus>>,
        hardware: Arc<Mutex<Box<dyn HardwareInterface>>>,
        poll_period: Duration,
        poll_lpt_inputs: bool,
    ) -> Self {
        Self {
            bus,
            hardware,
            poll_period,
            poll_lpt_inputs,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Connects the hardware, registers output-mirroring watchers,
    /// publishes the hardware's current state into the bus, publishes the
    /// bus's current output values back to hardware, then starts the
    /// input-polling worker.
    pub fn start(&mut self) -> Result<()> {
        self.hardware.lock().connect()?;

        {
            let mut bus = self.bus.lock();
            for signal in PASSIVE_OUTPUTS {
                let hardware = self.hardware.clone();
                bus.watch(
                    signal,
                    "io_bridge::output_mirror",
                    Box::new(move |signal, new, _old| {
                        hardware
                            .lock()
                            .write_output(signal, new)
                            .map_err(|e| e.to_string())
                    }),
                );
            }

            let mut hardware = self.hardware.lock();
            for signal in ACTIVE_INPUTS {
                if let Ok(value) = hardware.read_input(signal) {
                    bus.set(signal, value);
                }
            }
            if self.poll_lpt_inputs {
                for port in crate::signal::names::Port::ALL {
                    for signal in lpt_input_signals(port) {
                        if let Ok(value) = hardware.read_input(signal) {
                            bus.set(signal, value);
                        }
                    }
                }
            }
            for signal in PASSIVE_OUTPUTS {
                let value = bus.get(signal);
                let _ = hardware.write_output(signal, value);
            }
        }

        self.spawn_poll_worker();
        Ok(())
    }

    fn spawn_poll_worker(&mut self) {
        let bus = self.bus.clone();
        let hardware = self.hardware.clone();
        let stop = self.stop.clone();
        let period = self.poll_period;
        let poll_lpt_inputs = self.poll_lpt_inputs;

        self.worker = Some(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                {
                    let mut hw = hardware.lock();
                    let mut bus = bus.lock();
                    for signal in ACTIVE_INPUTS {
                        match hw.read_input(signal) {
                            Ok(value) => bus.set(signal, value),
                            Err(error) => {
                                tracing::warn!(%signal, %error, "input poll failed, keeping previous value")
                            }
                        }
                    }
                    if poll_lpt_inputs {
                        for port in crate::signal::names::Port::ALL {
                            for signal in lpt_input_signals(port) {
                                match hw.read_input(signal) {
                                    Ok(value) => bus.set(signal, value),
                                    Err(error) => {
                                        tracing::warn!(%signal, %error, "input poll failed, keeping previous value")
                                    }
                                }
                            }
                        }
                    }
                }
                thread::sleep(period);
            }
        }));
    }

    /// Stops the polling worker within one period, drives safe output
    /// states, and releases the hardware handle.
    pub fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        {
            let mut bus = self.bus.lock();
            bus.set(Signal::LReq, false);
            bus.set(Signal::UReq, false);
            bus.set(Signal::Ready, false);
            bus.set(Signal::HoAvbl, true);
            bus.set(Signal::Es, true);
        }

        self.hardware.lock().disconnect()
    }
}

fn lpt_input_signals(port: crate::signal::names::Port) -> [Signal; 4] {
    [
        Signal::CarrierPresent(port),
        Signal::LatchLocked(port),
        Signal::LptError(port),
        Signal::LptReady(port),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulation::{SimulatedHardware, SimulationConfig};
    use std::collections::HashMap;

    fn bridge() -> (IoBridge, Arc<Mutex<SignalBus>>) {
        let bus = Arc::new(Mutex::new(SignalBus::new()));
        let hardware: Arc<Mutex<Box<dyn HardwareInterface>>> =
            Arc::new(Mutex::new(Box::new(SimulatedHardware::new(SimulationConfig::default()))));
        let bridge = IoBridge::new(bus.clone(), hardware, Duration::from_millis(10), true);
        (bridge, bus)
    }

    #[test]
    fn start_publishes_hardware_defaults_into_the_bus() {
        let (mut bridge, bus) = bridge();
        bridge.start().unwrap();
        assert!(bus.lock().get(Signal::HoAvbl));
        bridge.shutdown().unwrap();
    }

    #[test]
    fn output_write_is_mirrored_to_hardware() {
        let (mut bridge, bus) = bridge();
        bridge.start().unwrap();
        bus.lock().set(Signal::Ready, true);
        thread::sleep(Duration::from_millis(20));
        bridge.shutdown().unwrap();
    }

    #[test]
    fn shutdown_drives_safe_output_states() {
        let (mut bridge, bus) = bridge();
        bridge.start().unwrap();
        bus.lock().set(Signal::Ready, true);
        bus.lock().set(Signal::LReq, true);
        bridge.shutdown().unwrap();
        let snapshot: HashMap<_, _> = bus.lock().snapshot().into_iter().collect();
        assert_eq!(snapshot[&Signal::Ready], false);
        assert_eq!(snapshot[&Signal::LReq], false);
        assert_eq!(snapshot[&Signal::HoAvbl], true);
        assert_eq!(snapshot[&Signal::Es], true);
    }
}
