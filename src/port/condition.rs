//! Port condition: a derived, immutable
//! snapshot of one load port used by the arbiter to decide transitions
//! outside an active handshake.
//!
//! Grounded in original_source/port_states.py's `PortCondition`/`PortState`.

use crate::signal::names::Port;

/// The six-valued derived state of a load port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    Selected,
    Unselected,
    Available,
    Error,
    NotReady,
    HoOff,
}

/// A snapshot of one port's condition at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCondition {
    pub port: Port,
    pub lpt_ready: bool,
    pub lpt_error: bool,
    pub carrier_present: bool,
    pub valid: bool,
    pub ho_avbl: bool,
}

impl PortCondition {
    pub fn new(
        port: Port,
        lpt_ready: bool,
        lpt_error: bool,
        carrier_present: bool,
        valid: bool,
        ho_avbl: bool,
    ) -> Self {
        Self {
            port,
            lpt_ready,
            lpt_error,
            carrier_present,
            valid,
            ho_avbl,
        }
    }

    /// Priority of computation, highest wins: `!ho_avbl` →
    /// `HoOff`, `lpt_error` → `Error`, `!lpt_ready` → `NotReady`, `valid`
    /// → `Selected`, else `Available`.
    pub fn state(&self) -> PortState {
        if !self.ho_avbl {
            PortState::HoOff
        } else if self.lpt_error {
            PortState::Error
        } else if !self.lpt_ready {
            PortState::NotReady
        } else if self.valid {
            PortState::Selected
        } else {
            PortState::Available
        }
    }

    pub fn is_ready_for_handshake(&self) -> bool {
        self.lpt_ready && !self.lpt_error && self.ho_avbl
    }

    pub fn with_error(&self, lpt_error: bool) -> Self {
        Self { lpt_error, ..*self }
    }

    pub fn with_ready(&self, lpt_ready: bool) -> Self {
        Self { lpt_ready, ..*self }
    }

    pub fn with_valid(&self, valid: bool) -> Self {
        Self { valid, ..*self }
    }

    pub fn with_ho_avbl(&self, ho_avbl: bool) -> Self {
        Self { ho_avbl, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(port: Port) -> PortCondition {
        PortCondition::new(port, true, false, false, false, true)
    }

    #[test]
    fn priority_order_matches_spec() {
        let mut c = base(Port::P0);
        assert_eq!(c.state(), PortState::Available);

        c.valid = true;
        assert_eq!(c.state(), PortState::Selected);

        c.lpt_ready = false;
        assert_eq!(c.state(), PortState::NotReady, "not-ready beats selected");

        c.lpt_error = true;
        assert_eq!(c.state(), PortState::Error, "error beats not-ready");

        c.ho_avbl = false;
        assert_eq!(c.state(), PortState::HoOff, "ho_off beats everything");
    }

    #[test]
    fn with_helpers_only_touch_named_field() {
        let c = base(Port::P1);
        let e = c.with_error(true);
        assert!(e.lpt_error);
        assert_eq!(e.lpt_ready, c.lpt_ready);
        assert_eq!(e.port, Port::P1);
    }
}
