//! Runtime for executing inbound events
//!
//! Owns everything the workflow core does not: idempotency claims, record
//! loading, effect execution and notification fan-out.

mod executor;
mod fanout;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{Engine, EngineConfig, EngineError};
pub use traits::*;

use crate::blob::LocalFileSink;
use crate::telegram::TelegramClient;

/// Type alias for production engine with concrete implementations
pub type ProductionEngine = Engine<DatabaseStore, LocalFileSink, TelegramClient>;
