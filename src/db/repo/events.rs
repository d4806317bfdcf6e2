//! Payment event rows and the pool balance lock.

use crate::domain::{Decimal, EventId, GroupId, MemberId, PaymentEvent, TimeMs};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decode_decimal, decode_parsed, Repository};

const EVENT_COLUMNS: &str =
    "id, group_id, organizer_id, per_member_amount, due_ms, pool_balance, version, created_ms";

/// Pool balance as read under the row lock, with the version the lock took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRow {
    pub balance: Decimal,
    pub version: i64,
}

fn event_from_row(row: &SqliteRow) -> Result<PaymentEvent, sqlx::Error> {
    Ok(PaymentEvent {
        id: decode_parsed(row, "id")?,
        group_id: GroupId::new(row.try_get::<String, _>("group_id")?),
        organizer_id: MemberId::new(row.try_get::<String, _>("organizer_id")?),
        per_member_amount: decode_decimal(row, "per_member_amount")?,
        due_ms: TimeMs::new(row.try_get("due_ms")?),
        pool_balance: decode_decimal(row, "pool_balance")?,
        version: row.try_get("version")?,
        created_ms: TimeMs::new(row.try_get("created_ms")?),
    })
}

impl Repository {
    /// Insert a newly scheduled event.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_event(&self, event: &PaymentEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payment_events
                (id, group_id, organizer_id, per_member_amount, due_ms, pool_balance, version, created_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.group_id.as_str())
        .bind(event.organizer_id.as_str())
        .bind(event.per_member_amount.to_canonical_string())
        .bind(event.due_ms.as_ms())
        .bind(event.pool_balance.to_canonical_string())
        .bind(event.version)
        .bind(event.created_ms.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an event by id. The balance is a plain read and must not be used
    /// to decide a reservation.
    pub async fn get_event(&self, id: &EventId) -> Result<Option<PaymentEvent>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_events WHERE id = ?",
            EVENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Take the write lock on an event's pool row and read the fresh balance.
    ///
    /// This must be the first statement of the transaction: starting with a
    /// write makes SQLite grant the write lock up front (waiting on
    /// `busy_timeout`), so the balance returned here cannot be stale.
    ///
    /// Returns `None` if the event does not exist.
    pub async fn lock_pool(
        conn: &mut SqliteConnection,
        event_id: &EventId,
    ) -> Result<Option<PoolRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            UPDATE payment_events
            SET version = version + 1
            WHERE id = ?
            RETURNING pool_balance, version
            "#,
        )
        .bind(event_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|r| {
            Ok(PoolRow {
                balance: decode_decimal(&r, "pool_balance")?,
                version: r.try_get("version")?,
            })
        })
        .transpose()
    }

    /// Compare-and-set the pool balance against the version taken by
    /// `lock_pool`. Returns false if the version moved.
    pub async fn write_pool_balance(
        conn: &mut SqliteConnection,
        event_id: &EventId,
        balance: Decimal,
        expected_version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payment_events
            SET pool_balance = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(balance.to_canonical_string())
        .bind(event_id.to_string())
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Lock every event of a group. Returns the number of events locked.
    pub async fn lock_group_events(
        conn: &mut SqliteConnection,
        group_id: &GroupId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE payment_events SET version = version + 1 WHERE group_id = ?")
            .bind(group_id.as_str())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count pending or in-transit payouts across a group's events.
    pub async fn count_in_flight_payouts_for_group(
        conn: &mut SqliteConnection,
        group_id: &GroupId,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM payout_requests pr
            JOIN payment_events e ON e.id = pr.event_id
            WHERE e.group_id = ? AND pr.status IN ('pending', 'in_transit')
            "#,
        )
        .bind(group_id.as_str())
        .fetch_one(&mut *conn)
        .await?;

        row.try_get("n")
    }

    /// Delete a group's events. Contributions and payouts go with them via
    /// `ON DELETE CASCADE`.
    pub async fn delete_events_for_group(
        conn: &mut SqliteConnection,
        group_id: &GroupId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM payment_events WHERE group_id = ?")
            .bind(group_id.as_str())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
