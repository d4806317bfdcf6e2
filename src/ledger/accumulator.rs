//! Pool balance accumulator.
//!
//! The balance lives on the `payment_events` row. It is only mutated through
//! a [`PoolTx`], which takes the row lock as the first statement of its
//! transaction and then compare-and-sets every write against the version it
//! locked. `credit` and `reserve` therefore always see the persisted balance
//! at mutation time, and the ledger row that justifies the change is written
//! on the same transaction (`PoolTx::conn`).

use crate::db::Repository;
use crate::domain::{Decimal, EventId};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use super::{require_positive, LedgerError};

/// An open transaction holding the pool lock of one event.
///
/// Dropping it without `commit` rolls back every statement run on it,
/// including the row that motivated the balance change.
pub struct PoolTx {
    tx: Transaction<'static, Sqlite>,
    event_id: EventId,
    balance: Decimal,
    version: i64,
}

impl PoolTx {
    /// Begin a transaction and lock `event_id`'s pool.
    ///
    /// # Errors
    /// `NotFound` if the event does not exist.
    pub async fn begin(repo: &Repository, event_id: &EventId) -> Result<Self, LedgerError> {
        let mut tx = repo.begin().await?;
        let row = Repository::lock_pool(&mut *tx, event_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("event {}", event_id)))?;

        Ok(Self {
            tx,
            event_id: *event_id,
            balance: row.balance,
            version: row.version,
        })
    }

    /// Balance as of the lock, including writes made through this handle.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// The underlying connection, for ledger row changes that must commit
    /// together with the balance.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// `pool_balance += amount`.
    pub async fn credit(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        let next = credited(self.balance, amount)?;
        self.store(next).await?;
        Ok(next)
    }

    /// `pool_balance -= amount`, failing if the result would be negative.
    pub async fn reserve(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        let next = reserved(self.balance, amount)?;
        self.store(next).await?;
        Ok(next)
    }

    pub async fn commit(self) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn store(&mut self, next: Decimal) -> Result<(), LedgerError> {
        let written =
            Repository::write_pool_balance(&mut *self.tx, &self.event_id, next, self.version)
                .await?;
        if !written {
            return Err(LedgerError::ConcurrentModification);
        }
        debug!(
            event_id = %self.event_id,
            from = %self.balance,
            to = %next,
            "Pool balance updated"
        );
        self.balance = next;
        Ok(())
    }
}

fn credited(balance: Decimal, amount: Decimal) -> Result<Decimal, LedgerError> {
    balance
        .checked_add(require_positive(amount)?)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("crediting {} overflows the pool", amount)))
}

fn reserved(balance: Decimal, amount: Decimal) -> Result<Decimal, LedgerError> {
    let next = balance
        .checked_sub(require_positive(amount)?)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("reserving {} overflows the pool", amount)))?;
    if next.is_negative() {
        return Err(LedgerError::InsufficientBalance { balance });
    }
    Ok(next)
}
