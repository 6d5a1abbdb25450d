//! Round aggregate
//!
//! One instance of the spin-wheel game from creation to terminal state. The
//! aggregate owns its participant sequence and enforces the state-machine
//! preconditions; the service layer wraps each mutation in a store
//! transaction and drives the ledger alongside.
//!
//! # Critical Invariants
//!
//! 1. `winner_pool + admin_pool + app_pool == entry_fee * participants.len()`
//!    at every commit (integer arithmetic, exact)
//! 2. `elimination_order` is a permutation of participant ids once the round
//!    leaves Waiting; `elimination_index` never exceeds its length
//! 3. A Completed round has exactly one non-eliminated participant and
//!    `winner_id` equals its account id
//! 4. Elimination stops one draw early: the last name in the order is the
//!    winner and is never drawn

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::account::Account;

/// Round lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Waiting,
    InProgress,
    Completed,
    Aborted,
}

impl RoundStatus {
    /// Waiting or InProgress; at most one such round exists at any instant.
    pub fn is_active(&self) -> bool {
        matches!(self, RoundStatus::Waiting | RoundStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundStatus::Completed | RoundStatus::Aborted)
    }
}

/// Entry-fee split across the three pools, remainder folded into the winner
/// share so the total is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShares {
    pub winner: i64,
    pub admin: i64,
    pub app: i64,
}

/// Split one entry fee into pool shares using integer arithmetic.
///
/// `winner + admin + app == fee` holds exactly for any fee and any
/// percentages summing to 100.
pub fn split_entry_fee(fee: i64, winner_pct: u8, admin_pct: u8, app_pct: u8) -> PoolShares {
    debug_assert_eq!(winner_pct as u32 + admin_pct as u32 + app_pct as u32, 100);

    let winner = fee * winner_pct as i64 / 100;
    let admin = fee * admin_pct as i64 / 100;
    let app = fee * app_pct as i64 / 100;
    let remainder = fee - winner - admin - app;

    PoolShares { winner: winner + remainder, admin, app }
}

/// A joined player, snapshotted at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub account_id: Uuid,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub entry_fee_paid: i64,
    pub eliminated: bool,
    pub eliminated_at: Option<DateTime<Utc>>,
    pub elimination_position: Option<usize>,
}

/// Result of one elimination draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elimination {
    pub victim_id: Uuid,
    pub position: usize,
    pub remaining: usize,
}

/// Result of completing a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub winner_id: Uuid,
    pub winner_pool: i64,
    pub admin_pool: i64,
    pub app_pool: i64,
}

/// The round aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    id: Uuid,
    admin_id: Uuid,
    status: RoundStatus,
    entry_fee: i64,
    min_participants: usize,
    max_participants: usize,
    winner_pct: u8,
    admin_pct: u8,
    app_pct: u8,
    winner_pool: i64,
    admin_pool: i64,
    app_pool: i64,
    participants: Vec<Participant>,
    elimination_order: Vec<Uuid>,
    elimination_index: usize,
    auto_start_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    winner_id: Option<Uuid>,
    elimination_interval_ms: u64,
    auto_start_delay_ms: u64,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Round {
    /// Create a round in Waiting with empty pools.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admin_id: Uuid,
        entry_fee: i64,
        min_participants: usize,
        max_participants: usize,
        pcts: (u8, u8, u8),
        elimination_interval_ms: u64,
        auto_start_delay_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let (winner_pct, admin_pct, app_pct) = pcts;
        Self {
            id: Uuid::new_v4(),
            admin_id,
            status: RoundStatus::Waiting,
            entry_fee,
            min_participants,
            max_participants,
            winner_pct,
            admin_pct,
            app_pct,
            winner_pool: 0,
            admin_pool: 0,
            app_pool: 0,
            participants: Vec::new(),
            elimination_order: Vec::new(),
            elimination_index: 0,
            auto_start_at: now + chrono::Duration::milliseconds(auto_start_delay_ms as i64),
            started_at: None,
            completed_at: None,
            winner_id: None,
            elimination_interval_ms,
            auto_start_delay_ms,
            version: 1,
            created_at: now,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn admin_id(&self) -> Uuid {
        self.admin_id
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn entry_fee(&self) -> i64 {
        self.entry_fee
    }

    pub fn min_participants(&self) -> usize {
        self.min_participants
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    pub fn pools(&self) -> PoolShares {
        PoolShares {
            winner: self.winner_pool,
            admin: self.admin_pool,
            app: self.app_pool,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn elimination_order(&self) -> &[Uuid] {
        &self.elimination_order
    }

    pub fn elimination_index(&self) -> usize {
        self.elimination_index
    }

    pub fn auto_start_at(&self) -> DateTime<Utc> {
        self.auto_start_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn winner_id(&self) -> Option<Uuid> {
        self.winner_id
    }

    pub fn elimination_interval(&self) -> Duration {
        Duration::from_millis(self.elimination_interval_ms)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants
    }

    pub fn has_participant(&self, account_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.account_id == account_id)
    }

    /// Number of non-eliminated participants.
    pub fn remaining(&self) -> usize {
        self.participants.iter().filter(|p| !p.eliminated).count()
    }

    /// The single survivor, if exactly one participant is non-eliminated.
    pub fn survivor(&self) -> Option<&Participant> {
        let mut alive = self.participants.iter().filter(|p| !p.eliminated);
        let first = alive.next()?;
        if alive.next().is_some() {
            return None;
        }
        Some(first)
    }

    // ========================================================================
    // State-machine transitions
    // ========================================================================

    /// Check every join precondition except funds coverage.
    pub fn can_admit(&self, account_id: Uuid) -> Result<(), EngineError> {
        if self.status != RoundStatus::Waiting {
            return Err(EngineError::Conflict(
                "round is not open for joining".to_string(),
            ));
        }

        if account_id == self.admin_id {
            return Err(EngineError::Authorization(
                "round admin cannot join their own round".to_string(),
            ));
        }

        if self.has_participant(account_id) {
            return Err(EngineError::Conflict(
                "account already joined this round".to_string(),
            ));
        }

        if self.is_full() {
            return Err(EngineError::Conflict("round is full".to_string()));
        }

        Ok(())
    }

    /// Admit a participant and fold their entry fee into the pools.
    pub fn add_participant(
        &mut self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<&Participant, EngineError> {
        self.can_admit(account.id())?;

        let shares = split_entry_fee(
            self.entry_fee,
            self.winner_pct,
            self.admin_pct,
            self.app_pct,
        );
        self.winner_pool += shares.winner;
        self.admin_pool += shares.admin;
        self.app_pool += shares.app;

        self.participants.push(Participant {
            account_id: account.id(),
            name: account.name().to_string(),
            joined_at: now,
            entry_fee_paid: self.entry_fee,
            eliminated: false,
            eliminated_at: None,
            elimination_position: None,
        });

        Ok(self.participants.last().unwrap())
    }

    /// Fix the elimination order and move to InProgress.
    pub fn begin(&mut self, order: Vec<Uuid>, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.status != RoundStatus::Waiting {
            return Err(EngineError::InvalidState(
                "round is not waiting to start".to_string(),
            ));
        }

        if self.participants.len() < self.min_participants {
            return Err(EngineError::NotEnoughParticipants {
                have: self.participants.len(),
                need: self.min_participants,
            });
        }

        if order.len() != self.participants.len()
            || !order.iter().all(|id| self.has_participant(*id))
        {
            return Err(EngineError::Internal(
                "elimination order is not a permutation of participants".to_string(),
            ));
        }

        self.elimination_order = order;
        self.elimination_index = 0;
        self.started_at = Some(now);
        self.status = RoundStatus::InProgress;
        Ok(())
    }

    /// Draw the next victim from the pre-computed order.
    ///
    /// The caller completes the round once `remaining() == 1`; the final name
    /// in the order is never drawn.
    pub fn eliminate_next(&mut self, now: DateTime<Utc>) -> Result<Elimination, EngineError> {
        if self.status != RoundStatus::InProgress {
            return Err(EngineError::InvalidState(
                "round is not in progress".to_string(),
            ));
        }

        if self.elimination_index >= self.elimination_order.len() || self.remaining() <= 1 {
            return Err(EngineError::InvalidState(
                "no eliminations left to draw".to_string(),
            ));
        }

        let victim_id = self.elimination_order[self.elimination_index];
        let position = self.elimination_index + 1;

        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.account_id == victim_id)
            .ok_or_else(|| {
                EngineError::Internal("elimination order names an unknown participant".to_string())
            })?;

        participant.eliminated = true;
        participant.eliminated_at = Some(now);
        participant.elimination_position = Some(position);
        self.elimination_index += 1;

        Ok(Elimination {
            victim_id,
            position,
            remaining: self.remaining(),
        })
    }

    /// Terminal transition to Completed once exactly one participant survives.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<Completion, EngineError> {
        if self.status != RoundStatus::InProgress {
            return Err(EngineError::InvalidState(
                "round is not in progress".to_string(),
            ));
        }

        let winner_id = self
            .survivor()
            .map(|p| p.account_id)
            .ok_or_else(|| {
                EngineError::InvalidState(
                    "round does not have exactly one survivor".to_string(),
                )
            })?;

        self.status = RoundStatus::Completed;
        self.completed_at = Some(now);
        self.winner_id = Some(winner_id);

        Ok(Completion {
            winner_id,
            winner_pool: self.winner_pool,
            admin_pool: self.admin_pool,
            app_pool: self.app_pool,
        })
    }

    /// Terminal transition to Aborted; only legal while Waiting.
    ///
    /// Returns the refund owed to each participant and zeroes the pools.
    pub fn abort(&mut self, now: DateTime<Utc>) -> Result<Vec<(Uuid, i64)>, EngineError> {
        match self.status {
            RoundStatus::Waiting => {}
            RoundStatus::InProgress => {
                return Err(EngineError::InvalidState(
                    "eliminations are binding once a round starts".to_string(),
                ));
            }
            RoundStatus::Completed | RoundStatus::Aborted => {
                return Err(EngineError::InvalidState(
                    "round already reached a terminal state".to_string(),
                ));
            }
        }

        let refunds: Vec<(Uuid, i64)> = self
            .participants
            .iter()
            .map(|p| (p.account_id, p.entry_fee_paid))
            .collect();

        self.winner_pool = 0;
        self.admin_pool = 0;
        self.app_pool = 0;
        self.status = RoundStatus::Aborted;
        self.completed_at = Some(now);

        Ok(refunds)
    }

    /// Event-facing snapshot of the round.
    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            id: self.id,
            admin_id: self.admin_id,
            status: self.status,
            entry_fee: self.entry_fee,
            min_participants: self.min_participants,
            max_participants: self.max_participants,
            winner_pool: self.winner_pool,
            admin_pool: self.admin_pool,
            app_pool: self.app_pool,
            num_participants: self.participants.len(),
            auto_start_at: self.auto_start_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            winner_id: self.winner_id,
        }
    }
}

/// Compact round view carried in events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub status: RoundStatus,
    pub entry_fee: i64,
    pub min_participants: usize,
    pub max_participants: usize,
    pub winner_pool: i64,
    pub admin_pool: i64,
    pub app_pool: i64,
    pub num_participants: usize,
    pub auto_start_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub winner_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::Role;

    fn test_round(entry_fee: i64, max: usize) -> Round {
        Round::new(
            Uuid::new_v4(),
            entry_fee,
            3,
            max,
            (70, 20, 10),
            1_000,
            60_000,
            Utc::now(),
        )
    }

    fn user(name: &str) -> Account {
        Account::new(name.to_string(), Role::User, 10_000, Utc::now())
    }

    fn join_n(round: &mut Round, n: usize) -> Vec<Account> {
        let accounts: Vec<Account> = (0..n).map(|i| user(&format!("u{}", i))).collect();
        for account in &accounts {
            round.add_participant(account, Utc::now()).unwrap();
        }
        accounts
    }

    #[test]
    fn test_split_entry_fee_exact() {
        let shares = split_entry_fee(100, 70, 20, 10);
        assert_eq!(shares, PoolShares { winner: 70, admin: 20, app: 10 });
    }

    #[test]
    fn test_split_remainder_folds_into_winner() {
        // 33/33/34 of 10: floor shares are 3/3/3, remainder 1 goes to winner
        let shares = split_entry_fee(10, 33, 33, 34);
        assert_eq!(shares.winner + shares.admin + shares.app, 10);
        assert_eq!(shares.admin, 3);
        assert_eq!(shares.app, 3);
        assert_eq!(shares.winner, 4);
    }

    #[test]
    fn test_pools_track_entry_fees_exactly() {
        let mut round = test_round(101, 5);
        join_n(&mut round, 4);

        let pools = round.pools();
        assert_eq!(pools.winner + pools.admin + pools.app, 101 * 4);
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut round = test_round(100, 5);
        let alice = user("alice");

        round.add_participant(&alice, Utc::now()).unwrap();
        let err = round.add_participant(&alice, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "CONFLICT");
    }

    #[test]
    fn test_admin_self_join_rejected() {
        let round = test_round(100, 5);
        let err = round.can_admit(round.admin_id()).unwrap_err();
        assert_eq!(err.kind(), "AUTHORIZATION");
    }

    #[test]
    fn test_full_round_rejects_join() {
        let mut round = test_round(100, 3);
        join_n(&mut round, 3);

        let late = user("late");
        let err = round.add_participant(&late, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "CONFLICT");
    }

    #[test]
    fn test_begin_requires_minimum() {
        let mut round = test_round(100, 5);
        let accounts = join_n(&mut round, 2);
        let order: Vec<Uuid> = accounts.iter().map(|a| a.id()).collect();

        let err = round.begin(order, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            EngineError::NotEnoughParticipants { have: 2, need: 3 }
        );
    }

    #[test]
    fn test_begin_rejects_foreign_order() {
        let mut round = test_round(100, 5);
        join_n(&mut round, 3);

        let bogus: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let err = round.begin(bogus, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "INTERNAL");
    }

    #[test]
    fn test_elimination_stops_before_last_draw() {
        let mut round = test_round(100, 5);
        let accounts = join_n(&mut round, 3);
        let order: Vec<Uuid> = accounts.iter().map(|a| a.id()).collect();
        round.begin(order.clone(), Utc::now()).unwrap();

        let first = round.eliminate_next(Utc::now()).unwrap();
        assert_eq!(first.victim_id, order[0]);
        assert_eq!(first.position, 1);
        assert_eq!(first.remaining, 2);

        let second = round.eliminate_next(Utc::now()).unwrap();
        assert_eq!(second.remaining, 1);

        // Two participants drawn out of three; the last name is never drawn.
        let err = round.eliminate_next(Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");

        let completion = round.complete(Utc::now()).unwrap();
        assert_eq!(completion.winner_id, order[2]);
        assert_eq!(round.status(), RoundStatus::Completed);
        assert_eq!(round.winner_id(), Some(order[2]));
    }

    #[test]
    fn test_complete_requires_single_survivor() {
        let mut round = test_round(100, 5);
        let accounts = join_n(&mut round, 3);
        let order: Vec<Uuid> = accounts.iter().map(|a| a.id()).collect();
        round.begin(order, Utc::now()).unwrap();

        let err = round.complete(Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");
    }

    #[test]
    fn test_abort_refunds_and_zeroes_pools() {
        let mut round = test_round(100, 5);
        let accounts = join_n(&mut round, 2);

        let refunds = round.abort(Utc::now()).unwrap();
        assert_eq!(refunds.len(), 2);
        assert!(refunds.iter().all(|(_, amount)| *amount == 100));
        assert!(refunds.iter().any(|(id, _)| *id == accounts[0].id()));

        let pools = round.pools();
        assert_eq!((pools.winner, pools.admin, pools.app), (0, 0, 0));
        assert_eq!(round.status(), RoundStatus::Aborted);

        // Terminal: a second abort must not refund again.
        let err = round.abort(Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");
    }

    #[test]
    fn test_abort_rejected_in_progress() {
        let mut round = test_round(100, 5);
        let accounts = join_n(&mut round, 3);
        let order: Vec<Uuid> = accounts.iter().map(|a| a.id()).collect();
        round.begin(order, Utc::now()).unwrap();

        let err = round.abort(Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");
    }
}
