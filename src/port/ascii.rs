//! ASCII serial load-port dialect.
//!
//! CR+LF framed command/response/event lines: `HCS` commands, `FSR`/`FSD`
//! status queries, `AERS`/`ARS` unsolicited events. A background thread
//! drains unsolicited lines between commands off the same serial handle;
//! `parking_lot::Mutex` guards the handle itself, mirroring the original's
//! `threading.RLock()` around its `serial.Serial`.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::adapter::{LoadPortAdapter, PortStatus};
use crate::signal::bus::SignalBus;
use crate::signal::names::{Port, Signal};

/// A serial transport abstraction, so tests can substitute an in-memory
/// pair instead of a real `serialport::SerialPort`.
pub trait SerialLine: Send {
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
    fn read_line(&mut self, timeout: Duration) -> std::io::Result<Option<String>>;
}

/// Wraps a `Box<dyn serialport::SerialPort>` behind the line-oriented
/// interface above. Only built with the `ascii` feature.
#[cfg(feature = "ascii")]
pub struct SerialPortLine {
    port: Box<dyn serialport::SerialPort>,
    reader_buf: Vec<u8>,
}

#[cfg(feature = "ascii")]
impl SerialPortLine {
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::TransportError(e.to_string()))?;
        Ok(Self {
            port,
            reader_buf: Vec::new(),
        })
    }
}

#[cfg(feature = "ascii")]
impl SerialLine for SerialPortLine {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()
    }

    fn read_line(&mut self, _timeout: Duration) -> std::io::Result<Option<String>> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    if byte[0] == b'\n' {
                        let line = String::from_utf8_lossy(&self.reader_buf)
                            .trim_end_matches('\r')
                            .to_string();
                        self.reader_buf.clear();
                        return Ok(Some(line));
                    }
                    self.reader_buf.push(byte[0]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Last-seen alarm code for diagnostics (original_source/load_port_ascii.py
/// `ALMID` tracking): retains the last non-`"0000"` code seen.
#[derive(Debug, Default, Clone)]
pub struct AlarmState {
    pub last_code: Option<String>,
}

impl AlarmState {
    fn observe(&mut self, code: &str) {
        if code != "0000" {
            self.last_code = Some(code.to_string());
        }
    }
}

/// The ASCII/serial load-port adapter. Owns the command/response dialect
/// in addition to the shared [`LoadPortAdapter`] status contract.
pub struct AsciiAdapter {
    port: Port,
    line: Arc<Mutex<dyn SerialLine>>,
    alarms: Arc<Mutex<AlarmState>>,
}

impl AsciiAdapter {
    pub fn new(port: Port, line: Arc<Mutex<dyn SerialLine>>) -> Self {
        Self {
            port,
            line,
            alarms: Arc::new(Mutex::new(AlarmState::default())),
        }
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarms.lock().clone()
    }

    /// Sends an `HCS` command and waits for the `HCA OK` / `HCA ERR`
    /// confirmation line (original_source/load_port_ascii.py `_send_command`).
    fn send_command(&self, command: &str) -> Result<String> {
        let mut line = self.line.lock();
        line.write_line(command)
            .map_err(|e| Error::TransportError(e.to_string()))?;
        loop {
            let response = line
                .read_line(Duration::from_secs(2))
                .map_err(|e| Error::TransportError(e.to_string()))?
                .ok_or_else(|| Error::TransportError("no response to command".to_string()))?;
            if response.starts_with("AERS") || response.starts_with("ARS") {
                // Unsolicited event arrived while waiting: hand it to the
                // monitor's parser and keep waiting for the real reply.
                handle_event_line(&response, &mut self.alarms.lock());
                continue;
            }
            return Ok(response);
        }
    }

    fn confirm(&self, response: &str) -> Result<()> {
        if response.starts_with("HCA OK") {
            Ok(())
        } else {
            Err(Error::TransportError(format!(
                "load port rejected command: {response}"
            )))
        }
    }

    pub fn enable_load(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("ENABLE LOAD P{}", self.port.index()))?)
    }

    pub fn enable_unload(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("ENABLE UNLOAD P{}", self.port.index()))?)
    }

    pub fn disable_load(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("DISABLE LOAD P{}", self.port.index()))?)
    }

    pub fn disable_unload(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("DISABLE UNLOAD P{}", self.port.index()))?)
    }

    pub fn load(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("LOAD P{}", self.port.index()))?)
    }

    pub fn unload(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("UNLOAD P{}", self.port.index()))?)
    }

    pub fn recovery(&self) -> Result<()> {
        self.confirm(&self.send_command("RECOVERY")?)
    }

    pub fn lock_port(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("LOCK P{}", self.port.index()))?)
    }

    pub fn unlock_port(&self) -> Result<()> {
        self.confirm(&self.send_command(&format!("UNLK P{}", self.port.index()))?)
    }

    /// Queries `FSR`/`FSD` and parses the `PIP`/`PRTST`/`READY`/`ALMID`
    /// fields out of the `KEY=VALUE` response (original_source
    /// `_parse_status_response`, `_update_port_status`).
    pub fn query_status(&self, bus: &mut SignalBus) -> Result<PortStatus> {
        let response = self.send_command(&format!("FSR P{}", self.port.index()))?;
        let fields = parse_status_fields(&response);

        let carrier_present = fields.get("PIP").map(|v| v == "1").unwrap_or(false);
        let lpt_error = fields
            .get("PRTST")
            .map(|v| v != "0" && !v.is_empty())
            .unwrap_or(false);
        let lpt_ready = fields.get("READY").map(|v| v == "1").unwrap_or(true);
        if let Some(alm) = fields.get("ALMID") {
            self.alarms.lock().observe(alm);
        }

        bus.set(Signal::CarrierPresent(self.port), carrier_present);
        bus.set(Signal::LptError(self.port), lpt_error);
        bus.set(Signal::LptReady(self.port), lpt_ready);

        Ok(self.status(bus))
    }
}

impl LoadPortAdapter for AsciiAdapter {
    fn port(&self) -> Port {
        self.port
    }
}

/// Parses a `FSD` response's `KEY=VALUE` pairs, space-separated.
fn parse_status_fields(response: &str) -> HashMap<String, String> {
    response
        .split_whitespace()
        .filter_map(|tok| tok.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Turns one unsolicited `AERS`/`ARS` line into a bus write, returning the
/// decoded event kind for logging. Grounded in original_source
/// `load_port_ascii.py`'s event-monitor thread.
fn handle_event_line(line: &str, alarms: &mut AlarmState) -> Option<&'static str> {
    if let Some(rest) = line.strip_prefix("AERS ") {
        let code = rest.split_whitespace().next_back().unwrap_or("");
        return Some(match code {
            "POD_ARRIVED" => "POD_ARRIVED",
            "POD_REMOVED" => "POD_REMOVED",
            "CMPL_LOCK" => "CMPL_LOCK",
            "CMPL_UNLOCK" => "CMPL_UNLOCK",
            "AUTO_MODE" => "AUTO_MODE",
            "POWER_UP" => "POWER_UP",
            _ => "UNKNOWN_EVENT",
        });
    }
    if let Some(rest) = line.strip_prefix("ARS ") {
        alarms.observe(rest.trim());
        return Some("ALARM");
    }
    None
}

/// Background thread draining unsolicited lines and applying them to the
/// bus for both ports sharing one serial connection.
pub fn spawn_event_monitor(
    line: Arc<Mutex<dyn SerialLine>>,
    bus: Arc<Mutex<SignalBus>>,
    alarms: Arc<Mutex<AlarmState>>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        let read = line.lock().read_line(Duration::from_millis(200));
        match read {
            Ok(Some(text)) => {
                if let Some(kind) = handle_event_line(&text, &mut alarms.lock()) {
                    tracing::debug!(event = kind, raw = %text, "load port event");
                    apply_event_to_bus(kind, &text, &bus);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "ascii event monitor read failed");
                std::thread::sleep(Duration::from_millis(500));
            }
        }
    })
}

fn apply_event_to_bus(kind: &str, line: &str, bus: &Arc<Mutex<SignalBus>>) {
    let port = if line.contains("P0") {
        Port::P0
    } else {
        Port::P1
    };
    let mut bus = bus.lock();
    match kind {
        "POD_ARRIVED" => bus.set(Signal::CarrierPresent(port), true),
        "POD_REMOVED" => bus.set(Signal::CarrierPresent(port), false),
        "CMPL_LOCK" => bus.set(Signal::LatchLocked(port), true),
        "CMPL_UNLOCK" => bus.set(Signal::LatchLocked(port), false),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeLine {
        outgoing: Vec<String>,
        incoming: VecDeque<String>,
    }

    impl SerialLine for FakeLine {
        fn write_line(&mut self, line: &str) -> std::io::Result<()> {
            self.outgoing.push(line.to_string());
            Ok(())
        }

        fn read_line(&mut self, _timeout: Duration) -> std::io::Result<Option<String>> {
            Ok(self.incoming.pop_front())
        }
    }

    #[test]
    fn parses_fsd_key_value_fields() {
        let fields = parse_status_fields("FSD P0 PIP=1 PRTST=0 READY=1 ALMID=0000");
        assert_eq!(fields.get("PIP").map(String::as_str), Some("1"));
        assert_eq!(fields.get("READY").map(String::as_str), Some("1"));
    }

    #[test]
    fn load_command_confirms_on_hca_ok() {
        let line: Arc<Mutex<dyn SerialLine>> = Arc::new(Mutex::new(FakeLine {
            outgoing: Vec::new(),
            incoming: VecDeque::from(vec!["HCA OK".to_string()]),
        }));
        let adapter = AsciiAdapter::new(Port::P0, line);
        assert!(adapter.load().is_ok());
    }

    #[test]
    fn rejects_non_ok_response() {
        let line: Arc<Mutex<dyn SerialLine>> = Arc::new(Mutex::new(FakeLine {
            outgoing: Vec::new(),
            incoming: VecDeque::from(vec!["HCA ERR 3".to_string()]),
        }));
        let adapter = AsciiAdapter::new(Port::P0, line);
        assert!(adapter.load().is_err());
    }

    #[test]
    fn alarm_state_retains_last_nonzero_code() {
        let mut alarms = AlarmState::default();
        alarms.observe("0000");
        assert!(alarms.last_code.is_none());
        alarms.observe("A17");
        assert_eq!(alarms.last_code.as_deref(), Some("A17"));
        alarms.observe("0000");
        assert_eq!(alarms.last_code.as_deref(), Some("A17"), "0000 does not clear it");
    }

    #[test]
    fn event_line_pod_arrived_decodes() {
        let mut alarms = AlarmState::default();
        assert_eq!(
            handle_event_line("AERS P0 POD_ARRIVED", &mut alarms),
            Some("POD_ARRIVED")
        );
    }
}
