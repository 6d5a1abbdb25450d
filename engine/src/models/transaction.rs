//! Append-only transaction records
//!
//! Every balance change leaves exactly one record, so any balance can be
//! reconstructed from the log. Records are never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction and purpose of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Join debit against a participant
    EntryFee,
    /// Abort credit returning a participant's entry fee
    Refund,
    /// Winner pool credit at completion
    PrizeWin,
    /// Admin pool credit at completion
    AdminCommission,
    /// House earnings record, tied to no account balance
    AppFee,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::EntryFee => "EntryFee",
            TransactionKind::Refund => "Refund",
            TransactionKind::PrizeWin => "PrizeWin",
            TransactionKind::AdminCommission => "AdminCommission",
            TransactionKind::AppFee => "AppFee",
        }
    }
}

/// One immutable ledger entry.
///
/// `amount` is signed: negative for debits, positive for credits.
/// `balance_before`/`balance_after` are the authoritative account balances at
/// commit time; both are zero for [`TransactionKind::AppFee`] records, which
/// carry no account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub round_id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
