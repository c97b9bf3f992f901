//! Core data types for the signal service.

mod bar;
mod instrument;
mod quote;
mod signal;

pub use bar::Bar;
pub use instrument::{split_qualified_id, Category, Instrument};
pub use quote::Quote;
pub use signal::{Signal, SignalAction};
