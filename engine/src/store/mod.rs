//! Document store
//!
//! In-memory realization of the durable store seam: multi-document atomic
//! transactions, optimistic concurrency on rounds, and the singleton active
//! round rule.

pub mod memory;

pub use memory::{MemoryStore, StoreSnapshot, StoreTxn};
