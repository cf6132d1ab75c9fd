//! Document status state machine and pub/sub event bus (spec §4.1, §6).

pub mod bus;
pub mod state_machine;

pub use bus::{EventBus, StatusEvent};
pub use state_machine::DocumentStateMachine;
