//! Signal computation engine.
//!
//! Reads bar histories plus the latest quotes, applies the registered
//! strategy rules and maintains the current signal set. The engine
//! exclusively owns the signal store; everything else reads it through
//! listing and enrichment.

pub mod context;
pub mod engine;
pub mod signal_store;

pub use context::{StoreClient, StoreFactory};
pub use engine::{EngineConfig, PassSummary, Scope, SignalEngine};
pub use signal_store::SignalStore;
