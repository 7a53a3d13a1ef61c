//! Handshake State Machine facade.

pub mod machine;
pub mod state;
pub mod timeout;

pub use machine::{HandshakeMachine, Operation, TransitionRecord};
pub use state::HandshakeState;
pub use timeout::TimeoutTimer;
