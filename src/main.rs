//! Process entry point: parses the CLI, loads configuration, wires up the
//! hardware interface for the selected operating mode, and drives the
//! controller's poll loop until a shutdown signal arrives.
//!
//! Grounded in original_source/main.py's `main()`: argument parsing, config
//! loading with CLI overrides, logging setup, hardware/controller/bridge
//! construction, and signal-driven shutdown. The original also wires a
//! Tkinter GUI (`create_gui`); there is no GUI surface here.

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use parking_lot::Mutex;

use e84ctl::cli::Cli;
use e84ctl::config::{Config, InterfaceKind, OperatingMode};
use e84ctl::controller::Controller;
use e84ctl::error::{Error, Result};
use e84ctl::hardware::digital_io::{DigitalIoCard, DioPort};
use e84ctl::hardware::simulation::{SimulatedHardware, SimulationConfig};
use e84ctl::hardware::HardwareInterface;
use e84ctl::io_bridge::IoBridge;
use e84ctl::port::adapter::{LoadPortAdapter, ParallelAdapter};
use e84ctl::signal::bus::SignalBus;
use e84ctl::signal::names::Port;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&cli, &mut config);

    let log_level = cli.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = match e84ctl::logging::init(&log_level, &config.logging) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("failed to initialize logging: {error}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        mode = ?config.operating_mode,
        interface = ?config.load_port_interface,
        "starting"
    );

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    if Path::new(&cli.config).exists() {
        Config::load(&cli.config)
    } else {
        tracing::debug!(path = %cli.config.display(), "no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Applies CLI flags on top of the loaded file, matching
/// original_source/main.py's precedence (CLI wins).
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(mode) = cli.normalized_mode() {
        if let Ok(mode) = OperatingMode::parse(&mode) {
            config.operating_mode = mode;
        }
    }
    if let Some(interface) = &cli.interface {
        if let Ok(interface) = InterfaceKind::parse(interface) {
            config.load_port_interface = interface;
        }
    }
    if let Some(serial_port) = &cli.serial_port {
        config.serial.port = serial_port.clone();
    }
}

fn run(config: Config) -> Result<()> {
    let hardware = build_hardware(&config)?;
    let adapters = build_adapters(&config)?;

    let mut controller = Controller::new(adapters);
    controller.full_reset();

    let shared_bus = Arc::new(Mutex::new(SignalBus::new()));
    let poll_lpt_inputs = matches!(config.load_port_interface, InterfaceKind::Parallel);
    let mut bridge = IoBridge::new(shared_bus.clone(), hardware, config.poll_period(), poll_lpt_inputs);
    bridge.start()?;

    let stop = Arc::new(AtomicBool::new(false));
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        ctrlc_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| Error::Config(format!("installing signal handler: {e}")))?;

    let poll_period = config.poll_period();
    while !stop.load(Ordering::SeqCst) {
        // Swap the controller's own bus for the one the I/O Bridge mirrors
        // hardware through, step it there (so the bridge's output watchers
        // fire inline), then swap back, all under one lock so the poll
        // worker never observes a bus mid-step.
        let mut guard = shared_bus.lock();
        std::mem::swap(&mut *guard, controller.bus_mut());
        controller.step();
        std::mem::swap(&mut *guard, controller.bus_mut());
        drop(guard);

        std::thread::sleep(poll_period);
    }

    tracing::info!("shutting down");
    bridge.shutdown()?;
    Ok(())
}

fn build_hardware(config: &Config) -> Result<Arc<Mutex<Box<dyn HardwareInterface>>>> {
    let interface: Box<dyn HardwareInterface> = match config.operating_mode {
        OperatingMode::Simulation => {
            let sim_config = SimulationConfig {
                auto_respond: config.simulation.auto_respond,
                random_errors: config.simulation.random_errors,
                error_rate: config.simulation.error_rate,
                initial_states: config.simulation.resolve_initial_states()?,
            };
            Box::new(SimulatedHardware::new(sim_config))
        }
        OperatingMode::Production | OperatingMode::Emulation => {
            let (e84_pins, lpt_pins) = config.dio.resolve_pin_maps()?;
            let e84_port = open_dio_port(&config.dio.e84_device)?;
            let mut card = DigitalIoCard::new(e84_port, e84_pins);
            if matches!(config.load_port_interface, InterfaceKind::Parallel) {
                if let (Some(device), Some(pins)) = (&config.dio.lpt_device, lpt_pins) {
                    let lpt_port = open_dio_port(device)?;
                    card = card.with_lpt_card(lpt_port, pins);
                }
            }
            Box::new(card)
        }
    };
    Ok(Arc::new(Mutex::new(interface)))
}

/// Resolves a digital-I/O device name to its driver binding. The physical
/// driver itself sits below the [`DioPort`] boundary and is supplied by the deployment, not by this crate.
fn open_dio_port(device: &str) -> Result<Box<dyn DioPort>> {
    Err(Error::Config(format!(
        "no digital-I/O driver binding registered for device {device}; \
         run in simulation mode, or link a driver binding that implements DioPort"
    )))
}

fn build_adapters(config: &Config) -> Result<[Box<dyn LoadPortAdapter>; 2]> {
    match config.load_port_interface {
        InterfaceKind::Parallel => Ok([
            Box::new(ParallelAdapter::new(Port::P0)) as Box<dyn LoadPortAdapter>,
            Box::new(ParallelAdapter::new(Port::P1)) as Box<dyn LoadPortAdapter>,
        ]),
        InterfaceKind::Ascii => build_ascii_adapters(config),
    }
}

#[cfg(feature = "ascii")]
fn build_ascii_adapters(config: &Config) -> Result<[Box<dyn LoadPortAdapter>; 2]> {
    use e84ctl::port::ascii::{AsciiAdapter, SerialLine, SerialPortLine};
    use std::time::Duration;

    let timeout = Duration::from_secs_f64(config.serial.timeout_secs);
    let line = SerialPortLine::open(&config.serial.port, config.serial.baud_rate, timeout)?;
    let line: Arc<Mutex<dyn SerialLine>> = Arc::new(Mutex::new(line));
    Ok([
        Box::new(AsciiAdapter::new(Port::P0, line.clone())) as Box<dyn LoadPortAdapter>,
        Box::new(AsciiAdapter::new(Port::P1, line)) as Box<dyn LoadPortAdapter>,
    ])
}

#[cfg(not(feature = "ascii"))]
fn build_ascii_adapters(_config: &Config) -> Result<[Box<dyn LoadPortAdapter>; 2]> {
    Err(Error::Config(
        "ASCII load-port interface requested but the crate was built without the `ascii` feature".to_string(),
    ))
}
