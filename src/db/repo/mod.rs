//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `events.rs` - Payment events and the pool balance row lock
//! - `contributions.rs` - Contribution ledger rows
//! - `payouts.rs` - Payout request rows
//!
//! Methods taking `&self` run on the pool. Associated functions taking a
//! `&mut SqliteConnection` are meant to be called with `&mut *tx` so several
//! of them share one transaction.

mod contributions;
mod events;
mod payouts;

pub use events::PoolRow;

use crate::domain::Decimal;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Start a transaction.
    ///
    /// Balance-mutating transactions must take the pool lock
    /// (`Repository::lock_pool`) as their first statement.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Round-trip a trivial query; used by the readiness probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn column_error<E>(column: &str, err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

/// Decode a TEXT column holding a canonical decimal.
///
/// A corrupt amount is a decode error, never a silent zero.
fn decode_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| column_error(column, e))
}

fn decode_parsed<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| column_error(column, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{
        ContributionStatus, Decimal, GroupId, MemberId, PaymentEvent, PayoutRequest,
        PayoutStatus, Settlement, TimeMs,
    };
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn scheduled_event(repo: &Repository) -> PaymentEvent {
        let event = PaymentEvent::new(
            GroupId::new("g1"),
            MemberId::new("org"),
            dec("50"),
            TimeMs::new(1_700_000_000_000),
        );
        repo.insert_event(&event).await.unwrap();
        event
    }

    #[tokio::test]
    async fn test_insert_and_get_event() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;

        let loaded = repo.get_event(&event.id).await.unwrap().unwrap();
        assert_eq!(loaded.group_id, event.group_id);
        assert_eq!(loaded.organizer_id, event.organizer_id);
        assert_eq!(loaded.per_member_amount, dec("50"));
        assert!(loaded.pool_balance.is_zero());
    }

    #[tokio::test]
    async fn test_lock_pool_bumps_version_and_cas_write() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;

        let mut tx = repo.begin().await.unwrap();
        let locked = Repository::lock_pool(&mut *tx, &event.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locked.version, 1);
        assert!(locked.balance.is_zero());

        let stale = Repository::write_pool_balance(&mut *tx, &event.id, dec("5"), 0)
            .await
            .unwrap();
        assert!(!stale, "write against an old version must not apply");

        let fresh = Repository::write_pool_balance(&mut *tx, &event.id, dec("5"), locked.version)
            .await
            .unwrap();
        assert!(fresh);
        tx.commit().await.unwrap();

        let loaded = repo.get_event(&event.id).await.unwrap().unwrap();
        assert_eq!(loaded.pool_balance, dec("5"));
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_lock_pool_missing_event() {
        let (repo, _temp) = setup_test_db().await;
        let mut tx = repo.begin().await.unwrap();
        let missing = Repository::lock_pool(&mut *tx, &crate::domain::EventId::generate())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_ensure_contributions_is_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;
        let members = vec![MemberId::new("a"), MemberId::new("b")];

        assert_eq!(repo.ensure_contributions(&event.id, &members).await.unwrap(), 2);
        assert_eq!(repo.ensure_contributions(&event.id, &members).await.unwrap(), 0);

        let more = vec![MemberId::new("b"), MemberId::new("c")];
        assert_eq!(repo.ensure_contributions(&event.id, &more).await.unwrap(), 1);

        let rows = repo.list_contributions(&event.id).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|c| c.member_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(rows.iter().all(|c| c.status == ContributionStatus::Pending));
    }

    #[tokio::test]
    async fn test_processor_settlement_roundtrip_and_guard() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;
        repo.ensure_contributions(&event.id, &[MemberId::new("a")])
            .await
            .unwrap();
        let row = repo.list_contributions(&event.id).await.unwrap().remove(0);

        assert!(repo.set_checkout_session(&row.id, "cs_1").await.unwrap());
        let found = repo.find_contribution_by_session("cs_1").await.unwrap().unwrap();
        assert_eq!(found.id, row.id);

        let mut tx = repo.begin().await.unwrap();
        let first = Repository::mark_processor_settled(&mut *tx, &row.id, dec("50"), "cs_1", TimeMs::new(5))
            .await
            .unwrap();
        let second = Repository::mark_processor_settled(&mut *tx, &row.id, dec("100"), "cs_1", TimeMs::new(6))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(first);
        assert!(!second, "an already paid row must not be settled again");

        let loaded = repo.get_contribution(&row.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ContributionStatus::Paid);
        assert_eq!(loaded.amount_settled, dec("50"));
        assert_eq!(
            loaded.settlement,
            Some(Settlement::Processor {
                reference: "cs_1".to_string()
            })
        );
        assert_eq!(loaded.settled_ms, Some(TimeMs::new(5)));
        assert!(!repo.set_checkout_session(&row.id, "cs_2").await.unwrap());
    }

    #[tokio::test]
    async fn test_manual_settlement_stores_typed_delta() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;
        repo.ensure_contributions(&event.id, &[MemberId::new("a")])
            .await
            .unwrap();
        let row = repo.list_contributions(&event.id).await.unwrap().remove(0);

        let mut tx = repo.begin().await.unwrap();
        assert!(
            Repository::mark_manual_settled(&mut *tx, &row.id, dec("30"), dec("30"), TimeMs::new(1))
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();

        let loaded = repo.get_contribution(&row.id).await.unwrap().unwrap();
        assert_eq!(loaded.settlement, Some(Settlement::Manual { delta: dec("30") }));

        let mut tx = repo.begin().await.unwrap();
        assert!(Repository::clear_manual_settlement(&mut *tx, &row.id, Decimal::zero())
            .await
            .unwrap());
        assert!(!Repository::clear_manual_settlement(&mut *tx, &row.id, Decimal::zero())
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let loaded = repo.get_contribution(&row.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ContributionStatus::Pending);
        assert!(loaded.settlement.is_none());
        assert!(loaded.settled_ms.is_none());
    }

    #[tokio::test]
    async fn test_payout_status_updates_are_conditional() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;
        let payout = PayoutRequest::pending(event.id, MemberId::new("org"), dec("10"));

        let mut tx = repo.begin().await.unwrap();
        Repository::insert_payout(&mut *tx, &payout).await.unwrap();
        let in_flight = Repository::find_in_flight_payout(&mut *tx, &event.id)
            .await
            .unwrap();
        assert_eq!(in_flight.map(|p| p.id), Some(payout.id));
        tx.commit().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        assert!(Repository::mark_payout_in_transit(&mut *tx, &payout.id, Some("tr_1"), None)
            .await
            .unwrap());
        assert!(!Repository::mark_payout_in_transit(&mut *tx, &payout.id, Some("tr_2"), None)
            .await
            .unwrap());
        assert!(Repository::mark_payout_failed(&mut *tx, &payout.id, "account closed")
            .await
            .unwrap());
        assert!(!Repository::mark_payout_paid(&mut *tx, &payout.id, TimeMs::new(9))
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let loaded = repo.get_payout(&payout.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PayoutStatus::Failed);
        assert_eq!(loaded.transfer_ref.as_deref(), Some("tr_1"));
        assert_eq!(loaded.failure_reason.as_deref(), Some("account closed"));
    }

    #[tokio::test]
    async fn test_deleting_events_cascades_to_children() {
        let (repo, _temp) = setup_test_db().await;
        let event = scheduled_event(&repo).await;
        repo.ensure_contributions(&event.id, &[MemberId::new("a")])
            .await
            .unwrap();
        let payout = PayoutRequest {
            status: PayoutStatus::Paid,
            ..PayoutRequest::pending(event.id, MemberId::new("org"), dec("10"))
        };

        let mut tx = repo.begin().await.unwrap();
        Repository::insert_payout(&mut *tx, &payout).await.unwrap();
        let deleted = Repository::delete_events_for_group(&mut *tx, &event.group_id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(deleted, 1);
        assert!(repo.list_contributions(&event.id).await.unwrap().is_empty());
        assert!(repo.get_payout(&payout.id).await.unwrap().is_none());
    }
}
