//! Table-driven finite state machine engine.
//!
//! A [`TransitionTable`] maps `(state, event kind)` to a target state and an
//! optional [`Action`]. Tables are built once per entity kind and shared by
//! `&'static` reference; each entity owns a [`StateMachine`] holding only its
//! current state.

mod error;
mod machine;
mod table;

pub use error::{ActionError, TableError, TransitionError};
pub use machine::StateMachine;
pub use table::{Action, TableBuilder, Transition, TransitionTable};
