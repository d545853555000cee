//! Event hooks. The APIs publish an event after the transaction that caused it has committed.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{publish, EventHandlers, EventHooks, EventProducers};
