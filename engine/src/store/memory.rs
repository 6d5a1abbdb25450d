//! In-memory store with atomic transactions
//!
//! All documents live behind one write lock. A transaction stages a copy of
//! the full state and swaps it in only when the closure succeeds, so a
//! mid-transaction error leaves nothing committed. Round writes carry an OCC
//! version check; the store also enforces that at most one round is Waiting
//! or InProgress at any instant.
//!
//! # Critical Invariants
//!
//! - **Atomicity**: a transaction commits fully or not at all
//! - **Commit-order events**: events handed over during commit are published
//!   while the write lock is held, so per-round delivery order equals commit
//!   order
//! - **Singleton active round**: inserts are rejected while another round is
//!   Waiting or InProgress

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::EngineError;
use crate::events::{types::EngineEvent, EventPublisher};
use crate::models::account::Account;
use crate::models::round::{Round, RoundStatus};
use crate::models::transaction::{TransactionKind, TransactionRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    accounts: HashMap<Uuid, Account>,
    rounds: HashMap<Uuid, Round>,
    records: Vec<TransactionRecord>,
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreState>,
}

/// An open transaction over staged state.
pub struct StoreTxn<'a> {
    state: &'a mut StoreState,
}

/// Serializable image of the full store, for restart simulation and backups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    state: StoreState,
}

impl StoreSnapshot {
    /// SHA256 digest of the canonical JSON image.
    pub fn digest(&self) -> String {
        let json = serde_json::to_vec(&self.state).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run `f` against staged state; commit only on `Ok`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> Result<T, EngineError>,
    {
        self.transaction_with_events(&crate::events::NullPublisher, |txn| {
            f(txn).map(|value| (value, Vec::new()))
        })
    }

    /// Run `f` against staged state; on commit, publish the returned events
    /// in order while the write lock is still held.
    pub fn transaction_with_events<T, F>(
        &self,
        publisher: &dyn EventPublisher,
        f: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> Result<(T, Vec<EngineEvent>), EngineError>,
    {
        let mut guard = self.inner.write();
        let mut staged = guard.clone();

        let (value, events) = f(&mut StoreTxn { state: &mut staged })?;

        *guard = staged;
        for event in &events {
            publisher.publish(event);
        }

        Ok(value)
    }

    // ========================================================================
    // Read queries
    // ========================================================================

    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.inner.read().accounts.get(&id).cloned()
    }

    pub fn round(&self, id: Uuid) -> Option<Round> {
        self.inner.read().rounds.get(&id).cloned()
    }

    /// The round currently Waiting or InProgress, if any.
    pub fn active_round(&self) -> Option<Round> {
        self.inner
            .read()
            .rounds
            .values()
            .find(|r| r.status().is_active())
            .cloned()
    }

    /// Rounds ordered newest first, optionally filtered by status.
    pub fn history(&self, page: usize, limit: usize, status: Option<RoundStatus>) -> Vec<Round> {
        let state = self.inner.read();
        let mut rounds: Vec<Round> = state
            .rounds
            .values()
            .filter(|r| status.map_or(true, |s| r.status() == s))
            .cloned()
            .collect();
        rounds.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        paginate(rounds, page, limit)
    }

    /// Rounds a given account participated in, newest first.
    pub fn rounds_for_account(&self, account_id: Uuid, page: usize, limit: usize) -> Vec<Round> {
        let state = self.inner.read();
        let mut rounds: Vec<Round> = state
            .rounds
            .values()
            .filter(|r| r.has_participant(account_id))
            .cloned()
            .collect();
        rounds.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        paginate(rounds, page, limit)
    }

    /// Waiting rounds whose auto-start deadline has passed.
    pub fn due_waiting(&self, now: DateTime<Utc>) -> Vec<Round> {
        self.inner
            .read()
            .rounds
            .values()
            .filter(|r| r.status() == RoundStatus::Waiting && r.auto_start_at() <= now)
            .cloned()
            .collect()
    }

    /// All Waiting rounds.
    pub fn waiting_rounds(&self) -> Vec<Round> {
        self.inner
            .read()
            .rounds
            .values()
            .filter(|r| r.status() == RoundStatus::Waiting)
            .cloned()
            .collect()
    }

    /// All InProgress rounds.
    pub fn in_progress_rounds(&self) -> Vec<Round> {
        self.inner
            .read()
            .rounds
            .values()
            .filter(|r| r.status() == RoundStatus::InProgress)
            .cloned()
            .collect()
    }

    /// Transaction records for one account, newest first.
    pub fn records_for_account(
        &self,
        account_id: Uuid,
        page: usize,
        limit: usize,
        kind: Option<TransactionKind>,
    ) -> Vec<TransactionRecord> {
        let state = self.inner.read();
        let mut records: Vec<TransactionRecord> = state
            .records
            .iter()
            .filter(|r| r.account_id == Some(account_id))
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        paginate(records, page, limit)
    }

    /// Every record appended against one round, in append order.
    pub fn records_for_round(&self, round_id: Uuid) -> Vec<TransactionRecord> {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.round_id == round_id)
            .cloned()
            .collect()
    }

    // ========================================================================
    // Snapshot / restore
    // ========================================================================

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            state: self.inner.read().clone(),
        }
    }

    pub fn restore(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot.state),
        }
    }
}

impl StoreTxn<'_> {
    pub fn account(&self, id: Uuid) -> Result<&Account, EngineError> {
        self.state
            .accounts
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("account {}", id)))
    }

    pub fn account_mut(&mut self, id: Uuid) -> Result<&mut Account, EngineError> {
        self.state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("account {}", id)))
    }

    pub fn insert_account(&mut self, account: Account) {
        self.state.accounts.insert(account.id(), account);
    }

    pub fn round(&self, id: Uuid) -> Result<Round, EngineError> {
        self.state
            .rounds
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("round {}", id)))
    }

    pub fn active_round(&self) -> Option<&Round> {
        self.state.rounds.values().find(|r| r.status().is_active())
    }

    /// Insert a new round, enforcing the singleton active round rule.
    pub fn insert_round(&mut self, round: Round) -> Result<(), EngineError> {
        if round.status().is_active() {
            if let Some(active) = self.active_round() {
                return Err(EngineError::Conflict(format!(
                    "round {} is already active",
                    active.id()
                )));
            }
        }
        self.state.rounds.insert(round.id(), round);
        Ok(())
    }

    /// Write back a round read earlier in this or a prior transaction.
    ///
    /// Fails `CONFLICT` when the stored version no longer matches the version
    /// the caller observed; on success the stored version is incremented.
    pub fn update_round(&mut self, mut round: Round) -> Result<Round, EngineError> {
        let stored = self
            .state
            .rounds
            .get(&round.id())
            .ok_or_else(|| EngineError::NotFound(format!("round {}", round.id())))?;

        if stored.version() != round.version() {
            return Err(EngineError::Conflict(format!(
                "round {} version changed (observed {}, stored {})",
                round.id(),
                round.version(),
                stored.version()
            )));
        }

        round.set_version(round.version() + 1);
        let updated = round.clone();
        self.state.rounds.insert(round.id(), round);
        Ok(updated)
    }

    pub fn append_record(&mut self, record: TransactionRecord) {
        self.state.records.push(record);
    }
}

fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> Vec<T> {
    let page = page.max(1);
    items
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .collect()
}
