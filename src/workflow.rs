//! Stateless core of the cargo booking bot
//!
//! Implements the Elm Architecture pattern: every inbound event is routed by
//! the actor's session token or button payload, and a pure transition turns
//! the loaded records into effects. The runtime owns all I/O.

pub mod action;
mod approval;
pub mod dispatch;
mod edit;
pub mod effect;
pub mod event;
pub mod field;
pub mod keyboard;
pub mod metrics;
mod navigation;
mod registration;
pub mod render;
pub mod token;
pub mod transition;
pub mod validate;
mod wizard;

#[cfg(test)]
mod proptests;

pub use dispatch::{route, Route};
pub use effect::{Effect, Outgoing, View};
pub use event::{Inbound, InboundKind};
pub use keyboard::Markup;
pub use transition::{transition, Context};
