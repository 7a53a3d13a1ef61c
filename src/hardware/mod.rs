//! Hardware Interface: the boundary the I/O
//! Bridge drives, and the boundary production/simulation implementations
//! sit behind. Grounded in original_source/hardware_interface.py's abstract
//! `HardwareInterface` base class.

pub mod digital_io;
pub mod simulation;

pub use digital_io::DigitalIoCard;
pub use simulation::SimulatedHardware;

use crate::error::Result;
use crate::signal::names::Signal;

/// One raw pin read/write, below the signal layer: a digital-I/O board
/// reports/accepts bit positions, not signal names. The I/O Bridge is what
/// maps between the two using the configured pin map.
pub trait HardwareInterface: Send {
    /// Reads the current electrical state of `signal`'s mapped input pin.
    fn read_input(&mut self, signal: Signal) -> Result<bool>;

    /// Drives `signal`'s mapped output pin to `value`.
    fn write_output(&mut self, signal: Signal, value: bool) -> Result<()>;

    /// Opens/initializes the underlying transport. Called once at startup.
    fn connect(&mut self) -> Result<()>;

    /// Closes the underlying transport. Called once at shutdown.
    fn disconnect(&mut self) -> Result<()>;
}
