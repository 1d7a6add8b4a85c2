//! Core messaging between the shell and its UI

mod delivery;
mod message;

pub use delivery::*;
pub use message::*;
