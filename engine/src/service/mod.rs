//! Round state machine
//!
//! One method per lifecycle operation. Every mutation is a single store
//! transaction combining the round write with its ledger entries; events are
//! handed to the publisher at commit so subscribers observe committed state
//! only, in commit order.

pub mod envelope;

pub use envelope::{Envelope, ErrorBody};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::clock::Clock;
use crate::core::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{types::EngineEvent, AbortReason, EventPublisher};
use crate::ledger;
use crate::models::account::{Account, Role};
use crate::models::round::{Completion, Elimination, Round, RoundStatus};
use crate::models::transaction::{TransactionKind, TransactionRecord};
use crate::rng::WheelRng;
use crate::store::{MemoryStore, StoreTxn};

/// Result of one elimination draw, including the completion it may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EliminationOutcome {
    pub elimination: Elimination,
    pub completion: Option<Completion>,
}

/// The game lifecycle engine's command surface.
pub struct RoundService {
    store: Arc<MemoryStore>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn EventPublisher>,
    rng: Mutex<WheelRng>,
}

impl RoundService {
    pub fn new(
        store: Arc<MemoryStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => WheelRng::new(seed),
            None => WheelRng::from_entropy(b"spinwheel-engine"),
        };
        Self {
            store,
            config,
            clock,
            publisher,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Register an account with the configured opening balance.
    pub fn register_account(&self, name: &str, role: Role) -> Result<Account, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation(
                "account name must not be empty".to_string(),
            ));
        }

        let account = Account::new(
            name.to_string(),
            role,
            self.config.initial_balance,
            self.clock.now(),
        );
        self.store.transaction(|txn| {
            txn.insert_account(account.clone());
            Ok(())
        })?;
        Ok(account)
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Create a round in Waiting; fails `CONFLICT` while another round is
    /// Waiting or InProgress.
    pub fn create_round(
        &self,
        admin_id: Uuid,
        entry_fee: i64,
        max_participants: usize,
    ) -> Result<Round, EngineError> {
        if entry_fee < 1 {
            return Err(EngineError::Validation(
                "entry_fee must be at least 1".to_string(),
            ));
        }

        if max_participants < self.config.min_participants || max_participants > 1_000 {
            return Err(EngineError::Validation(format!(
                "max_participants must be within {}..=1000",
                self.config.min_participants
            )));
        }

        let round = self.store.transaction_with_events(&*self.publisher, |txn| {
            let admin = txn.account(admin_id)?;
            if !admin.is_active() {
                return Err(EngineError::Authorization(
                    "account is inactive".to_string(),
                ));
            }
            if !admin.is_admin() {
                return Err(EngineError::Authorization(
                    "admin role required".to_string(),
                ));
            }

            let round = Round::new(
                admin_id,
                entry_fee,
                self.config.min_participants,
                max_participants,
                (
                    self.config.winner_pct,
                    self.config.admin_pct,
                    self.config.app_pct,
                ),
                self.config.elimination_interval_ms,
                self.config.auto_start_delay_ms,
                self.clock.now(),
            );
            txn.insert_round(round.clone())?;

            let events = vec![EngineEvent::RoundCreated { round: round.summary() }];
            Ok((round, events))
        })?;

        tracing::info!(
            round_id = %round.id(),
            entry_fee,
            auto_start_at = %round.auto_start_at(),
            "round created"
        );
        Ok(round)
    }

    /// Join a Waiting round: debit the entry fee, snapshot the participant,
    /// and grow the pools, atomically. Capacity is re-checked at commit time.
    pub fn join(&self, round_id: Uuid, account_id: Uuid) -> Result<Round, EngineError> {
        let round = self.store.transaction_with_events(&*self.publisher, |txn| {
            let mut round = txn.round(round_id)?;
            let account = txn.account(account_id)?.clone();
            let now = self.clock.now();

            round.can_admit(account_id)?;
            ledger::debit(
                txn,
                account_id,
                round.entry_fee(),
                TransactionKind::EntryFee,
                round_id,
                serde_json::Value::Null,
                now,
            )?;
            let participant = round.add_participant(&account, now)?.clone();
            let updated = txn.update_round(round)?;

            let events = vec![EngineEvent::RoundJoined {
                round: updated.summary(),
                participant,
            }];
            Ok((updated, events))
        })?;

        tracing::debug!(
            round_id = %round_id,
            account_id = %account_id,
            participants = round.participants().len(),
            "participant joined"
        );
        Ok(round)
    }

    /// Fix the elimination order and move to InProgress. Manual or
    /// scheduler-driven.
    pub fn start(&self, round_id: Uuid) -> Result<Round, EngineError> {
        let round = self.store.transaction_with_events(&*self.publisher, |txn| {
            let mut round = txn.round(round_id)?;

            let mut order: Vec<Uuid> = round
                .participants()
                .iter()
                .map(|p| p.account_id)
                .collect();
            self.rng.lock().shuffle(&mut order);

            round.begin(order.clone(), self.clock.now())?;
            let updated = txn.update_round(round)?;

            let events = vec![EngineEvent::RoundStarted {
                round: updated.summary(),
                elimination_order: order,
            }];
            Ok((updated, events))
        })?;

        tracing::info!(
            round_id = %round_id,
            participants = round.participants().len(),
            "round started"
        );
        Ok(round)
    }

    /// Draw the next victim. Completes the round in the same transaction the
    /// moment one participant remains.
    pub fn eliminate_next(&self, round_id: Uuid) -> Result<EliminationOutcome, EngineError> {
        let outcome = self.store.transaction_with_events(&*self.publisher, |txn| {
            let mut round = txn.round(round_id)?;
            let now = self.clock.now();

            let elimination = round.eliminate_next(now)?;
            let mut events = vec![EngineEvent::RoundElimination {
                round_id,
                victim_id: elimination.victim_id,
                position: elimination.position,
                remaining: elimination.remaining,
            }];

            let mut completion = None;
            if round.remaining() == 1 {
                let (settled, mut settle_events) =
                    Self::settle_completion(txn, &mut round, now)?;
                completion = Some(settled);
                events.append(&mut settle_events);
            }

            txn.update_round(round)?;
            Ok((EliminationOutcome { elimination, completion }, events))
        })?;

        tracing::debug!(
            round_id = %round_id,
            victim_id = %outcome.elimination.victim_id,
            position = outcome.elimination.position,
            remaining = outcome.elimination.remaining,
            "participant eliminated"
        );
        if let Some(completion) = &outcome.completion {
            tracing::info!(
                round_id = %round_id,
                winner_id = %completion.winner_id,
                prize = completion.winner_pool,
                "round completed"
            );
        }
        Ok(outcome)
    }

    /// Complete an InProgress round with exactly one survivor. Normally
    /// triggered inline by [`Self::eliminate_next`]; also the scheduler's
    /// repair path.
    pub fn complete(&self, round_id: Uuid) -> Result<Round, EngineError> {
        let (round, completion) =
            self.store.transaction_with_events(&*self.publisher, |txn| {
                let mut round = txn.round(round_id)?;
                let (completion, events) =
                    Self::settle_completion(txn, &mut round, self.clock.now())?;
                let updated = txn.update_round(round)?;
                Ok(((updated, completion), events))
            })?;

        tracing::info!(
            round_id = %round_id,
            winner_id = %completion.winner_id,
            prize = completion.winner_pool,
            "round completed"
        );
        Ok(round)
    }

    /// Abort a Waiting round, refunding every participant. Rejected once
    /// eliminations have begun; a repeat call fails `INVALID_STATE`.
    pub fn abort(&self, round_id: Uuid, reason: AbortReason) -> Result<Round, EngineError> {
        let round = self.store.transaction_with_events(&*self.publisher, |txn| {
            let mut round = txn.round(round_id)?;
            let now = self.clock.now();

            let refunds = round.abort(now)?;
            let mut refunded = 0;
            for (account_id, amount) in refunds {
                ledger::credit(
                    txn,
                    account_id,
                    amount,
                    TransactionKind::Refund,
                    round_id,
                    serde_json::json!({ "reason": reason }),
                    now,
                )?;
                refunded += amount;
            }

            let updated = txn.update_round(round)?;
            let events = vec![EngineEvent::RoundAborted { round_id, reason, refunded }];
            Ok((updated, events))
        })?;

        tracing::info!(round_id = %round_id, ?reason, "round aborted");
        Ok(round)
    }

    /// Winner credit, admin commission, house fee, terminal state.
    fn settle_completion(
        txn: &mut StoreTxn<'_>,
        round: &mut Round,
        now: DateTime<Utc>,
    ) -> Result<(Completion, Vec<EngineEvent>), EngineError> {
        let completion = round.complete(now)?;

        ledger::credit(
            txn,
            completion.winner_id,
            completion.winner_pool,
            TransactionKind::PrizeWin,
            round.id(),
            serde_json::Value::Null,
            now,
        )?;
        ledger::credit(
            txn,
            round.admin_id(),
            completion.admin_pool,
            TransactionKind::AdminCommission,
            round.id(),
            serde_json::Value::Null,
            now,
        )?;
        ledger::record_system_fee(
            txn,
            round.id(),
            completion.app_pool,
            serde_json::Value::Null,
            now,
        );

        let events = vec![
            EngineEvent::RoundCompleted {
                round_id: round.id(),
                winner_id: completion.winner_id,
                winner_pool: completion.winner_pool,
                admin_pool: completion.admin_pool,
                app_pool: completion.app_pool,
            },
            EngineEvent::UserWon {
                account_id: completion.winner_id,
                round_id: round.id(),
                prize: completion.winner_pool,
            },
        ];
        Ok((completion, events))
    }

    // ========================================================================
    // Read queries
    // ========================================================================

    pub fn get_round(&self, round_id: Uuid) -> Result<Round, EngineError> {
        self.store
            .round(round_id)
            .ok_or_else(|| EngineError::NotFound(format!("round {}", round_id)))
    }

    pub fn get_active_round(&self) -> Option<Round> {
        self.store.active_round()
    }

    pub fn list_history(
        &self,
        page: usize,
        limit: usize,
        status: Option<RoundStatus>,
    ) -> Vec<Round> {
        self.store.history(page, limit, status)
    }

    pub fn list_my_rounds(
        &self,
        account_id: Uuid,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Round>, EngineError> {
        self.store
            .account(account_id)
            .ok_or_else(|| EngineError::NotFound(format!("account {}", account_id)))?;
        Ok(self.store.rounds_for_account(account_id, page, limit))
    }

    /// Run every join precondition without mutating anything.
    pub fn can_join(&self, account_id: Uuid, round_id: Uuid) -> Result<(), EngineError> {
        let round = self.get_round(round_id)?;
        let account = self
            .store
            .account(account_id)
            .ok_or_else(|| EngineError::NotFound(format!("account {}", account_id)))?;

        if !account.is_active() {
            return Err(EngineError::Authorization(
                "account is inactive".to_string(),
            ));
        }
        round.can_admit(account_id)?;
        if !account.can_pay(round.entry_fee()) {
            return Err(EngineError::InsufficientFunds {
                required: round.entry_fee(),
                available: account.balance(),
            });
        }
        Ok(())
    }

    pub fn get_balance(&self, account_id: Uuid) -> Result<i64, EngineError> {
        self.store
            .account(account_id)
            .map(|a| a.balance())
            .ok_or_else(|| EngineError::NotFound(format!("account {}", account_id)))
    }

    pub fn list_transactions(
        &self,
        account_id: Uuid,
        page: usize,
        limit: usize,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<TransactionRecord>, EngineError> {
        self.store
            .account(account_id)
            .ok_or_else(|| EngineError::NotFound(format!("account {}", account_id)))?;
        Ok(self.store.records_for_account(account_id, page, limit, kind))
    }
}
