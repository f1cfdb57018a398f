//! Conversation view-model reducer
//!
//! Elm-style: `transition` is pure and returns the effects the runtime must
//! carry out (launching or aborting a process, publishing state).

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::ViewModel;
pub use transition::transition;

#[cfg(test)]
pub use state::{ChatMessage, Role, SessionStatus};
