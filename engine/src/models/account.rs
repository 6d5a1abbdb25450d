//! Account model
//!
//! A registered player or round administrator. Balances are i64 whole coins
//! and are only ever mutated through the ledger; an account balance is never
//! negative at commit time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// A registered account.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use spinwheel_engine::{Account, Role};
///
/// let mut account = Account::new("alice".to_string(), Role::User, 1_000, Utc::now());
/// account.debit(300).unwrap();
/// assert_eq!(account.balance(), 700);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    id: Uuid,
    name: String,
    role: Role,
    balance: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with an opening balance.
    pub fn new(name: String, role: Role, balance: i64, created_at: DateTime<Utc>) -> Self {
        assert!(balance >= 0, "opening balance must be non-negative");
        Self {
            id: Uuid::new_v4(),
            name,
            role,
            balance,
            active: true,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Current balance in whole coins.
    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check whether the account can cover a debit of `amount`.
    pub fn can_pay(&self, amount: i64) -> bool {
        amount <= self.balance
    }

    /// Debit (decrease) the balance.
    ///
    /// Fails with `INSUFFICIENT_FUNDS` when the balance cannot cover the
    /// amount; the balance is never driven below zero.
    pub fn debit(&mut self, amount: i64) -> Result<(), EngineError> {
        assert!(amount >= 0, "amount must be non-negative");

        if !self.can_pay(amount) {
            return Err(EngineError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        Ok(())
    }

    /// Credit (increase) the balance. Unconditional.
    pub fn credit(&mut self, amount: i64) {
        assert!(amount >= 0, "amount must be non-negative");
        self.balance += amount;
    }

    /// Administratively mark the account inactive.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
