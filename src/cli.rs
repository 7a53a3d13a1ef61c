//! Command-line surface, mirroring
//! original_source/main.py's `parse_arguments` flag set and short-form
//! mode normalization exactly.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "e84ctl", about = "SEMI E84 parallel-I/O handoff controller")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Operating mode: production/prod, emulation/em, or simulation/sim.
    /// Overrides the config file's `operating_mode` when given.
    #[arg(long, value_parser = ["production", "prod", "emulation", "em", "simulation", "sim"])]
    pub mode: Option<String>,

    /// Load-port interface kind. Overrides the config file's
    /// `load_port_interface` when given.
    #[arg(long, value_parser = ["parallel", "ascii"])]
    pub interface: Option<String>,

    /// Serial port device path for the ASCII interface.
    #[arg(long = "serial-port")]
    pub serial_port: Option<String>,

    /// Console log level.
    #[arg(long = "log-level", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: Option<String>,
}

impl Cli {
    /// Normalizes a `--mode` short form to the canonical name, matching
    /// original_source/main.py's normalization block.
    pub fn normalized_mode(&self) -> Option<String> {
        self.mode.as_deref().map(|raw| match raw.to_lowercase().as_str() {
            "prod" => "production".to_string(),
            "em" | "emu" => "emulation".to_string(),
            "sim" => "simulation".to_string(),
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_mode_normalizes() {
        let cli = Cli::parse_from(["e84ctl", "--mode", "prod"]);
        assert_eq!(cli.normalized_mode().as_deref(), Some("production"));
    }

    #[test]
    fn no_mode_flag_normalizes_to_none() {
        let cli = Cli::parse_from(["e84ctl"]);
        assert_eq!(cli.normalized_mode(), None);
    }
}
