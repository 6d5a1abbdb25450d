//! Ledger
//!
//! Atomic balance mutations with append-only transaction records. All three
//! operations run inside an externally supplied store transaction and never
//! partially succeed; `balance_before`/`balance_after` in each record are the
//! authoritative values at commit time.
//!
//! # Critical Invariants
//!
//! 1. Every balance change appends exactly one immutable record
//! 2. `balance >= 0` after every committed debit
//! 3. Any balance can be reconstructed as `initial + sum(record.amount)`

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::transaction::{TransactionKind, TransactionRecord};
use crate::store::StoreTxn;

/// Debit an account and append the matching record.
///
/// Fails `INSUFFICIENT_FUNDS` when the balance cannot cover `amount` and
/// `AUTHORIZATION` when the account is inactive; in either case nothing is
/// staged.
pub fn debit(
    txn: &mut StoreTxn<'_>,
    account_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    round_id: Uuid,
    metadata: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<TransactionRecord, EngineError> {
    let account = txn.account_mut(account_id)?;

    if !account.is_active() {
        return Err(EngineError::Authorization(
            "account is inactive".to_string(),
        ));
    }

    let balance_before = account.balance();
    account.debit(amount)?;
    let balance_after = account.balance();

    let record = TransactionRecord {
        id: Uuid::new_v4(),
        account_id: Some(account_id),
        round_id,
        kind,
        amount: -amount,
        balance_before,
        balance_after,
        metadata,
        created_at: now,
    };
    txn.append_record(record.clone());
    Ok(record)
}

/// Credit an account unconditionally and append the matching record.
pub fn credit(
    txn: &mut StoreTxn<'_>,
    account_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    round_id: Uuid,
    metadata: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<TransactionRecord, EngineError> {
    let account = txn.account_mut(account_id)?;

    let balance_before = account.balance();
    account.credit(amount);
    let balance_after = account.balance();

    let record = TransactionRecord {
        id: Uuid::new_v4(),
        account_id: Some(account_id),
        round_id,
        kind,
        amount,
        balance_before,
        balance_after,
        metadata,
        created_at: now,
    };
    txn.append_record(record.clone());
    Ok(record)
}

/// Record house earnings for a round; tied to no account balance.
pub fn record_system_fee(
    txn: &mut StoreTxn<'_>,
    round_id: Uuid,
    amount: i64,
    metadata: serde_json::Value,
    now: DateTime<Utc>,
) -> TransactionRecord {
    let record = TransactionRecord {
        id: Uuid::new_v4(),
        account_id: None,
        round_id,
        kind: TransactionKind::AppFee,
        amount,
        balance_before: 0,
        balance_after: 0,
        metadata,
        created_at: now,
    };
    txn.append_record(record.clone());
    record
}
