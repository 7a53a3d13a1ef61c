//! The fixed signal universe.
//!
//! Signal names are a closed enumeration rather than free strings: dynamic
//! signal dispatch becomes a static registry keyed by a closed enumeration.
//! `UnknownSignal` can then only occur at a boundary where a name arrives
//! as text, which is the pin-map config file.

use std::fmt;
use std::str::FromStr;

/// One port identifier: the controller always has exactly two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Port {
    P0,
    P1,
}

impl Port {
    pub const ALL: [Port; 2] = [Port::P0, Port::P1];

    /// The other port. Used by arbiter rules that escalate only when
    /// *both* ports share a degraded state.
    pub fn other(self) -> Port {
        match self {
            Port::P0 => Port::P1,
            Port::P1 => Port::P0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Port::P0 => 0,
            Port::P1 => 1,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::P0 => write!(f, "0"),
            Port::P1 => write!(f, "1"),
        }
    }
}

/// A named boolean signal from the fixed universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    // Active inputs, driven by the AGV.
    Cs0,
    Cs1,
    Valid,
    TrReq,
    Busy,
    Compt,
    // Passive outputs, driven by this controller.
    LReq,
    UReq,
    Ready,
    HoAvbl,
    Es,
    // Per-port load-port inputs.
    LptReady(Port),
    LptError(Port),
    CarrierPresent(Port),
    LatchLocked(Port),
}

impl Signal {
    /// Every signal in the fixed universe, in a stable order used by
    /// `SignalBus::snapshot`.
    pub const ALL: [Signal; 18] = [
        Signal::Cs0,
        Signal::Cs1,
        Signal::Valid,
        Signal::TrReq,
        Signal::Busy,
        Signal::Compt,
        Signal::LReq,
        Signal::UReq,
        Signal::Ready,
        Signal::HoAvbl,
        Signal::Es,
        Signal::LptReady(Port::P0),
        Signal::LptReady(Port::P1),
        Signal::LptError(Port::P0),
        Signal::LptError(Port::P1),
        Signal::CarrierPresent(Port::P0),
        Signal::CarrierPresent(Port::P1),
        Signal::LatchLocked(Port::P0),
        Signal::LatchLocked(Port::P1),
    ];

    /// Default value on startup/reset").
    pub fn default_value(self) -> bool {
        matches!(
            self,
            Signal::HoAvbl | Signal::Es | Signal::LptReady(_)
        )
    }

    /// True for the five passive outputs this controller drives.
    pub fn is_passive(self) -> bool {
        matches!(
            self,
            Signal::LReq | Signal::UReq | Signal::Ready | Signal::HoAvbl | Signal::Es
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Cs0 => write!(f, "CS_0"),
            Signal::Cs1 => write!(f, "CS_1"),
            Signal::Valid => write!(f, "VALID"),
            Signal::TrReq => write!(f, "TR_REQ"),
            Signal::Busy => write!(f, "BUSY"),
            Signal::Compt => write!(f, "COMPT"),
            Signal::LReq => write!(f, "L_REQ"),
            Signal::UReq => write!(f, "U_REQ"),
            Signal::Ready => write!(f, "READY"),
            Signal::HoAvbl => write!(f, "HO_AVBL"),
            Signal::Es => write!(f, "ES"),
            Signal::LptReady(p) => write!(f, "LPT_READY_{p}"),
            Signal::LptError(p) => write!(f, "LPT_ERROR_{p}"),
            Signal::CarrierPresent(p) => write!(f, "CARRIER_PRESENT_{p}"),
            Signal::LatchLocked(p) => write!(f, "LATCH_LOCKED_{p}"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    /// Parses a signal name as it appears in a pin-map config file.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let port_suffixed = |base: &str, p: &str| -> Option<Port> {
            match (base, p) {
                (_, "0") => Some(Port::P0),
                (_, "1") => Some(Port::P1),
                _ => None,
            }
        };

        Ok(match s {
            "CS_0" => Signal::Cs0,
            "CS_1" => Signal::Cs1,
            "VALID" => Signal::Valid,
            "TR_REQ" => Signal::TrReq,
            "BUSY" => Signal::Busy,
            "COMPT" => Signal::Compt,
            "L_REQ" => Signal::LReq,
            "U_REQ" => Signal::UReq,
            "READY" => Signal::Ready,
            "HO_AVBL" => Signal::HoAvbl,
            "ES" => Signal::Es,
            _ => {
                let (base, port) = s.rsplit_once('_').ok_or_else(|| s.to_string())?;
                let port = port_suffixed(base, port).ok_or_else(|| s.to_string())?;
                match base {
                    "LPT_READY" => Signal::LptReady(port),
                    "LPT_ERROR" => Signal::LptError(port),
                    "CARRIER_PRESENT" => Signal::CarrierPresent(port),
                    "LATCH_LOCKED" => Signal::LatchLocked(port),
                    _ => return Err(s.to_string()),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_signal_name() {
        for sig in Signal::ALL {
            let name = sig.to_string();
            let parsed: Signal = name.parse().expect("name should parse back");
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("NOT_A_SIGNAL".parse::<Signal>().is_err());
        assert!("LPT_READY_2".parse::<Signal>().is_err());
    }

    #[test]
    fn defaults_match_spec() {
        assert!(Signal::HoAvbl.default_value());
        assert!(Signal::Es.default_value());
        assert!(Signal::LptReady(Port::P0).default_value());
        assert!(Signal::LptReady(Port::P1).default_value());
        assert!(!Signal::Cs0.default_value());
        assert!(!Signal::LptError(Port::P0).default_value());
    }
}
