//! Digital-I/O card hardware interface.
//!
//! The physical driver API (CONTEC's `cdio` in the original) is out of
//! scope past a thin trait boundary, so the card
//! itself is addressed through [`DioPort`], a byte-level bit read/write
//! boundary any concrete driver binding can implement. Grounded in
//! original_source/hardware_interface.py's `DioHardwareInterface`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::hardware::HardwareInterface;
use crate::signal::names::Signal;

/// One physical digital-I/O card's bit-level read/write surface.
pub trait DioPort: Send {
    fn read_bit(&mut self, bit: u8) -> Result<bool>;
    fn write_bit(&mut self, bit: u8, value: bool) -> Result<()>;
}

/// Signal-name-to-bit-index tables, already converted from board-pin form.
#[derive(Debug, Clone, Default)]
pub struct PinMap {
    inputs: HashMap<Signal, u8>,
    outputs: HashMap<Signal, u8>,
}

impl PinMap {
    /// Builds a pin map from board-pin numbers (1..=8, pin 1 = MSB),
    /// applying the `bit = 8 - board_pin` conversion. Rejects
    /// any board pin outside `1..=8`.
    pub fn from_board_pins(
        inputs: &HashMap<Signal, u8>,
        outputs: &HashMap<Signal, u8>,
    ) -> Result<Self> {
        let convert = |name: &str, table: &HashMap<Signal, u8>| -> Result<HashMap<Signal, u8>> {
            table
                .iter()
                .map(|(&signal, &board_pin)| {
                    if !(1..=8).contains(&board_pin) {
                        return Err(Error::Config(format!(
                            "{name} pin map: signal {signal} has board pin {board_pin}, must be 1..=8"
                        )));
                    }
                    Ok((signal, 8 - board_pin))
                })
                .collect()
        };
        Ok(Self {
            inputs: convert("input", inputs)?,
            outputs: convert("output", outputs)?,
        })
    }

    fn input_bit(&self, signal: Signal) -> Option<u8> {
        self.inputs.get(&signal).copied()
    }

    fn output_bit(&self, signal: Signal) -> Option<u8> {
        self.outputs.get(&signal).copied()
    }
}

/// One or two physical cards: E84 signals on `e84_port`, load-port signals
/// either on `lpt_port` (parallel mode, dual-card) or absent (ASCII mode,
/// where load-port signals are handled by `port::ascii` instead).
pub struct DigitalIoCard {
    e84_port: Box<dyn DioPort>,
    e84_pins: PinMap,
    lpt_port: Option<Box<dyn DioPort>>,
    lpt_pins: PinMap,
}

impl DigitalIoCard {
    pub fn new(e84_port: Box<dyn DioPort>, e84_pins: PinMap) -> Self {
        Self {
            e84_port,
            e84_pins,
            lpt_port: None,
            lpt_pins: PinMap::default(),
        }
    }

    pub fn with_lpt_card(mut self, lpt_port: Box<dyn DioPort>, lpt_pins: PinMap) -> Self {
        self.lpt_port = Some(lpt_port);
        self.lpt_pins = lpt_pins;
        self
    }
}

impl HardwareInterface for DigitalIoCard {
    fn read_input(&mut self, signal: Signal) -> Result<bool> {
        if let Some(bit) = self.e84_pins.input_bit(signal) {
            return self.e84_port.read_bit(bit);
        }
        if let (Some(port), Some(bit)) = (self.lpt_port.as_mut(), self.lpt_pins.input_bit(signal)) {
            return port.read_bit(bit);
        }
        Err(Error::TransportError(format!("no input pin mapped for {signal}")))
    }

    fn write_output(&mut self, signal: Signal, value: bool) -> Result<()> {
        if let Some(bit) = self.e84_pins.output_bit(signal) {
            return self.e84_port.write_bit(bit, value);
        }
        if let (Some(port), Some(bit)) = (self.lpt_port.as_mut(), self.lpt_pins.output_bit(signal)) {
            return port.write_bit(bit, value);
        }
        Err(Error::TransportError(format!("no output pin mapped for {signal}")))
    }

    fn connect(&mut self) -> Result<()> {
        for signal in [Signal::LReq, Signal::UReq, Signal::Ready] {
            if self.e84_pins.output_bit(signal).is_some() {
                self.write_output(signal, false)?;
            }
        }
        for signal in [Signal::HoAvbl, Signal::Es] {
            if self.e84_pins.output_bit(signal).is_some() {
                self.write_output(signal, true)?;
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePort {
        bits: [bool; 16],
    }

    impl DioPort for FakePort {
        fn read_bit(&mut self, bit: u8) -> Result<bool> {
            Ok(self.bits[bit as usize])
        }

        fn write_bit(&mut self, bit: u8, value: bool) -> Result<()> {
            self.bits[bit as usize] = value;
            Ok(())
        }
    }

    #[test]
    fn board_pin_one_converts_to_bit_seven() {
        let mut inputs = HashMap::new();
        inputs.insert(Signal::Cs0, 1u8);
        let map = PinMap::from_board_pins(&inputs, &HashMap::new()).unwrap();
        assert_eq!(map.input_bit(Signal::Cs0), Some(7));
    }

    #[test]
    fn out_of_range_board_pin_is_rejected() {
        let mut inputs = HashMap::new();
        inputs.insert(Signal::Cs0, 9u8);
        assert!(PinMap::from_board_pins(&inputs, &HashMap::new()).is_err());
    }

    #[test]
    fn write_then_read_round_trips_through_the_mapped_bit() {
        let mut outputs = HashMap::new();
        outputs.insert(Signal::Ready, 3u8);
        let mut inputs = HashMap::new();
        inputs.insert(Signal::Ready, 3u8);
        let pins = PinMap::from_board_pins(&inputs, &outputs).unwrap();
        let port = FakePort { bits: [false; 16] };
        let mut card = DigitalIoCard::new(Box::new(port), pins);
        card.write_output(Signal::Ready, true).unwrap();
        assert!(card.read_input(Signal::Ready).unwrap());
    }
}
