//! Widget state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds [`Event`]s through [`transition`] and executes the returned
//! [`Effect`]s. Nothing else mutates the model.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, SessionUpdate};
pub use state::{Theme, WidgetContext, WidgetModel, WidgetSnapshot, WidgetState};
pub use transition::{transition, TransitionError, TransitionResult};
