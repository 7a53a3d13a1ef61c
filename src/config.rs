//! Declarative configuration, loaded from a TOML file in
//! place of the original's importable Python module
//! (original_source/config_e84.py). A Rust crate has no equivalent to
//! "import an arbitrary `.py` as config", so TOML stands in as the pack's
//! plain declarative-config idiom.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::hardware::digital_io::PinMap;
use crate::signal::names::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Production,
    Emulation,
    Simulation,
}

impl OperatingMode {
    /// Normalizes the short forms accepted by the CLI (`prod`, `em`,
    /// `sim`) to the canonical name, matching original_source/main.py's
    /// normalization block.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "emulation" | "em" | "emu" => Ok(Self::Emulation),
            "simulation" | "sim" => Ok(Self::Simulation),
            other => Err(Error::Config(format!("unknown operating mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Parallel,
    Ascii,
}

impl InterfaceKind {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "ascii" => Ok(Self::Ascii),
            other => Err(Error::Config(format!("unknown interface kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DioConfig {
    #[serde(default = "default_e84_device")]
    pub e84_device: String,
    pub lpt_device: Option<String>,
    #[serde(default)]
    pub e84_input_pins: HashMap<String, u8>,
    #[serde(default)]
    pub e84_output_pins: HashMap<String, u8>,
    #[serde(default)]
    pub lpt_pins: HashMap<String, u8>,
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,
    #[serde(default = "default_i2c_address")]
    pub i2c_address: u8,
}

impl Default for DioConfig {
    fn default() -> Self {
        Self {
            e84_device: default_e84_device(),
            lpt_device: None,
            e84_input_pins: HashMap::new(),
            e84_output_pins: HashMap::new(),
            lpt_pins: HashMap::new(),
            i2c_bus: default_i2c_bus(),
            i2c_address: default_i2c_address(),
        }
    }
}

fn default_e84_device() -> String {
    "DIO000".to_string()
}

fn default_i2c_bus() -> u8 {
    1
}

fn default_i2c_address() -> u8 {
    0x20
}

impl DioConfig {
    /// Resolves the board-pin string-keyed tables into the per-signal
    /// [`PinMap`]s the hardware layer reads from. String names that do not match the fixed signal universe
    /// surface as [`Error::UnknownSignal`].
    pub fn resolve_pin_maps(&self) -> Result<(PinMap, Option<PinMap>)> {
        let parse_table = |table: &HashMap<String, u8>| -> Result<HashMap<Signal, u8>> {
            table
                .iter()
                .map(|(name, &pin)| {
                    name.parse::<Signal>()
                        .map(|signal| (signal, pin))
                        .map_err(|_| Error::UnknownSignal(name.clone()))
                })
                .collect()
        };

        let e84_inputs = parse_table(&self.e84_input_pins)?;
        let e84_outputs = parse_table(&self.e84_output_pins)?;
        let e84 = PinMap::from_board_pins(&e84_inputs, &e84_outputs)?;

        let lpt = if self.lpt_pins.is_empty() {
            None
        } else {
            let lpt_table = parse_table(&self.lpt_pins)?;
            Some(PinMap::from_board_pins(&lpt_table, &lpt_table)?)
        };

        Ok((e84, lpt))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_serial_timeout")]
    pub timeout_secs: f64,
    #[serde(default = "default_serial_timeout")]
    pub write_timeout_secs: f64,
    #[serde(default = "default_command_retries")]
    pub command_retries: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            timeout_secs: default_serial_timeout(),
            write_timeout_secs: default_serial_timeout(),
            command_retries: default_command_retries(),
        }
    }
}

fn default_serial_port() -> String {
    "/dev/ttyS0".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_parity() -> String {
    "none".to_string()
}
fn default_stop_bits() -> u8 {
    1
}
fn default_serial_timeout() -> f64 {
    1.0
}
fn default_command_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_true")]
    pub auto_respond: bool,
    #[serde(default)]
    pub random_errors: bool,
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    #[serde(default = "default_response_delay")]
    pub response_delay_secs: f64,
    #[serde(default)]
    pub initial_states: HashMap<String, bool>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            auto_respond: true,
            random_errors: false,
            error_rate: default_error_rate(),
            response_delay_secs: default_response_delay(),
            initial_states: HashMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_error_rate() -> f64 {
    0.05
}
fn default_response_delay() -> f64 {
    0.1
}

impl SimulationSettings {
    pub fn resolve_initial_states(&self) -> Result<HashMap<Signal, bool>> {
        self.initial_states
            .iter()
            .map(|(name, &value)| {
                name.parse::<Signal>()
                    .map(|signal| (signal, value))
                    .map_err(|_| Error::UnknownSignal(name.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_tp1")]
    pub tp1_secs: f64,
    #[serde(default = "default_tp2")]
    pub tp2_secs: f64,
    #[serde(default = "default_tp3")]
    pub tp3_secs: f64,
    #[serde(default = "default_tp4")]
    pub tp4_secs: f64,
    #[serde(default = "default_tp5")]
    pub tp5_secs: f64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            tp1_secs: default_tp1(),
            tp2_secs: default_tp2(),
            tp3_secs: default_tp3(),
            tp4_secs: default_tp4(),
            tp5_secs: default_tp5(),
        }
    }
}

fn default_tp1() -> f64 {
    2.0
}
fn default_tp2() -> f64 {
    2.0
}
fn default_tp3() -> f64 {
    60.0
}
fn default_tp4() -> f64 {
    60.0
}
fn default_tp5() -> f64 {
    2.0
}

impl TimeoutsConfig {
    pub fn tp1(&self) -> Duration {
        Duration::from_secs_f64(self.tp1_secs)
    }
    pub fn tp2(&self) -> Duration {
        Duration::from_secs_f64(self.tp2_secs)
    }
    pub fn tp3(&self) -> Duration {
        Duration::from_secs_f64(self.tp3_secs)
    }
    pub fn tp4(&self) -> Duration {
        Duration::from_secs_f64(self.tp4_secs)
    }
    pub fn tp5(&self) -> Duration {
        Duration::from_secs_f64(self.tp5_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_rotation_mb")]
    pub rotation_mb: u64,
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            rotation_mb: default_log_rotation_mb(),
            retention_days: default_log_retention_days(),
        }
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_log_file() -> String {
    "e84_controller.log".to_string()
}
fn default_log_rotation_mb() -> u64 {
    10
}
fn default_log_retention_days() -> u64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_operating_mode")]
    pub operating_mode: OperatingMode,
    #[serde(default = "default_interface_kind")]
    pub load_port_interface: InterfaceKind,
    #[serde(default)]
    pub dio: DioConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_poll_period_secs")]
    pub poll_period_secs: f64,
}

fn default_operating_mode() -> OperatingMode {
    OperatingMode::Production
}
fn default_interface_kind() -> InterfaceKind {
    InterfaceKind::Parallel
}
fn default_poll_period_secs() -> f64 {
    0.1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operating_mode: default_operating_mode(),
            load_port_interface: default_interface_kind(),
            dio: DioConfig::default(),
            serial: SerialConfig::default(),
            simulation: SimulationSettings::default(),
            timeouts: TimeoutsConfig::default(),
            logging: LoggingConfig::default(),
            poll_period_secs: default_poll_period_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs_f64(self.poll_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_short_forms_normalize_to_canonical_names() {
        assert_eq!(OperatingMode::parse("prod").unwrap(), OperatingMode::Production);
        assert_eq!(OperatingMode::parse("em").unwrap(), OperatingMode::Emulation);
        assert_eq!(OperatingMode::parse("sim").unwrap(), OperatingMode::Simulation);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(OperatingMode::parse("bogus").is_err());
    }

    #[test]
    fn defaults_match_the_original_configuration_module() {
        let config = Config::default();
        assert_eq!(config.timeouts.tp1_secs, 2.0);
        assert_eq!(config.timeouts.tp3_secs, 60.0);
        assert_eq!(config.logging.rotation_mb, 10);
        assert_eq!(config.logging.retention_days, 7);
    }

    #[test]
    fn loads_a_minimal_toml_document() {
        let dir = std::env::temp_dir().join("e84ctl_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "operating_mode = \"simulation\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.operating_mode, OperatingMode::Simulation);
    }

    #[test]
    fn resolves_pin_maps_from_signal_names() {
        let mut dio = DioConfig::default();
        dio.e84_input_pins.insert("CS_0".to_string(), 2);
        dio.e84_output_pins.insert("READY".to_string(), 3);
        let (pins, lpt) = dio.resolve_pin_maps().unwrap();
        assert!(lpt.is_none());
        let _ = pins;
    }

    #[test]
    fn unknown_pin_name_surfaces_as_unknown_signal() {
        let mut dio = DioConfig::default();
        dio.e84_input_pins.insert("NOT_A_SIGNAL".to_string(), 1);
        assert!(matches!(dio.resolve_pin_maps(), Err(Error::UnknownSignal(_))));
    }
}
