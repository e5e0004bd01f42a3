//! Messaging between the engine and the UI layer
//!
//! Components publish events over crossbeam channels; the UI drains them on its own loop.

pub mod messages;

pub use messages::{LotEvent, SessionEvent};
