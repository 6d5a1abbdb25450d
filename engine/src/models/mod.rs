//! Domain types

pub mod account;
pub mod round;
pub mod transaction;

pub use account::{Account, Role};
pub use round::{Participant, Round, RoundStatus, RoundSummary};
pub use transaction::{TransactionKind, TransactionRecord};
