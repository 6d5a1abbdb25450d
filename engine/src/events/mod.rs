//! Post-commit event contract and subscriber fan-out
//!
//! State changes flow from the service to an [`EventPublisher`]; the fan-out
//! for external subscribers and the scheduler's bookkeeping mailbox both
//! implement it. Events are published after commit only.

pub mod fanout;
pub mod types;

pub use fanout::EventFanout;
pub use types::{AbortReason, EngineEvent};

/// Narrow publishing capability handed to the service layer.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Publisher that drops every event; used by tests and plain transactions.
#[derive(Debug, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: &EngineEvent) {}
}

/// Fans one publish out to several publishers in order.
pub struct MultiPublisher {
    sinks: Vec<std::sync::Arc<dyn EventPublisher>>,
}

impl MultiPublisher {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventPublisher>>) -> Self {
        Self { sinks }
    }
}

impl EventPublisher for MultiPublisher {
    fn publish(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
