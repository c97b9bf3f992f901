//! Core trait definitions.

mod provider;
mod strategy;

pub use provider::QuoteProvider;
pub use strategy::{Evaluation, SignalRule};
