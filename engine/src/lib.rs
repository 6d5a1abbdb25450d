//! Spinwheel Engine - Round Lifecycle Core
//!
//! Real-time, multi-round elimination lottery engine with atomic coin
//! bookkeeping and timed state transitions.
//!
//! # Architecture
//!
//! - **core**: Configuration and time source
//! - **models**: Domain types (Account, Round, TransactionRecord)
//! - **store**: In-memory document store with atomic transactions and OCC
//! - **ledger**: Balance mutations with append-only transaction records
//! - **service**: The round state machine (create/join/start/eliminate/complete/abort)
//! - **scheduler**: Auto-start and elimination timers, restart recovery
//! - **events**: Post-commit event contract and subscriber fan-out
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 whole coins; balances never go negative
//! 2. Every balance change leaves an immutable transaction record
//! 3. Each mutation is one atomic store transaction; events fire after commit
//! 4. At most one round is Waiting or InProgress at any instant

// Module declarations
pub mod core;
pub mod error;
pub mod events;
pub mod ledger;
pub mod models;
pub mod rng;
pub mod scheduler;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::config::EngineConfig;
pub use error::EngineError;
pub use events::{
    fanout::EventFanout,
    types::{AbortReason, EngineEvent},
    EventPublisher, MultiPublisher, NullPublisher,
};
pub use models::{
    account::{Account, Role},
    round::{Participant, Round, RoundStatus, RoundSummary},
    transaction::{TransactionKind, TransactionRecord},
};
pub use rng::WheelRng;
pub use scheduler::{Scheduler, SchedulerMailbox};
pub use service::{Envelope, RoundService};
pub use store::MemoryStore;
