//! Session lifecycle: the client-side transition table and the coordinator
//! that keeps the session cache in step with the service.

mod coordinator;
mod machine;

pub use coordinator::{SessionCoordinator, build_board};
pub use machine::{SessionAction, SessionCommand, TransitionError, available_actions, next_state};
