//! Writing practice state machine
//!
//! Elm-style: `transition` is pure and returns the effects the runtime must
//! carry out. Tutor results come back in as events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{QuestionType, WritingState};
pub use transition::transition;
