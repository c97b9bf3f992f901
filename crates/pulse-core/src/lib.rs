//! Core types and traits for the signal service.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Instrument, Bar, Quote)
//! - Computed signal types
//! - Core traits for quote providers and signal rules
//! - The shared error taxonomy

pub mod types;
pub mod traits;
pub mod error;

pub use error::{PulseError, PulseResult};
pub use types::*;
pub use traits::*;
