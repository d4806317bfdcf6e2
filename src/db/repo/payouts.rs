//! Payout request rows.
//!
//! Every status update is conditioned on the current status in SQL, so a
//! late or duplicated notification can never move a row backwards.

use crate::domain::{EventId, MemberId, PayoutId, PayoutRequest, TimeMs};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decode_decimal, decode_parsed, Repository};

const PAYOUT_COLUMNS: &str = "id, event_id, organizer_id, amount, status, transfer_ref, \
     requested_ms, expected_ms, arrived_ms, failure_reason";

fn payout_from_row(row: &SqliteRow) -> Result<PayoutRequest, sqlx::Error> {
    Ok(PayoutRequest {
        id: decode_parsed(row, "id")?,
        event_id: decode_parsed(row, "event_id")?,
        organizer_id: MemberId::new(row.try_get::<String, _>("organizer_id")?),
        amount: decode_decimal(row, "amount")?,
        status: decode_parsed(row, "status")?,
        transfer_ref: row.try_get("transfer_ref")?,
        requested_ms: TimeMs::new(row.try_get("requested_ms")?),
        expected_ms: row.try_get::<Option<i64>, _>("expected_ms")?.map(TimeMs::new),
        arrived_ms: row.try_get::<Option<i64>, _>("arrived_ms")?.map(TimeMs::new),
        failure_reason: row.try_get("failure_reason")?,
    })
}

impl Repository {
    /// Insert a payout row. Fails on the single-flight index if the event
    /// already has a pending or in-transit payout.
    pub async fn insert_payout(
        conn: &mut SqliteConnection,
        payout: &PayoutRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payout_requests
                (id, event_id, organizer_id, amount, status, transfer_ref,
                 requested_ms, expected_ms, arrived_ms, failure_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payout.id.to_string())
        .bind(payout.event_id.to_string())
        .bind(payout.organizer_id.as_str())
        .bind(payout.amount.to_canonical_string())
        .bind(payout.status.as_str())
        .bind(payout.transfer_ref.as_deref())
        .bind(payout.requested_ms.as_ms())
        .bind(payout.expected_ms.map(|t| t.as_ms()))
        .bind(payout.arrived_ms.map(|t| t.as_ms()))
        .bind(payout.failure_reason.as_deref())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn find_in_flight_payout(
        conn: &mut SqliteConnection,
        event_id: &EventId,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payout_requests WHERE event_id = ? AND status IN ('pending', 'in_transit')",
            PAYOUT_COLUMNS
        ))
        .bind(event_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(payout_from_row).transpose()
    }

    pub async fn get_payout(&self, id: &PayoutId) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_payout(&mut conn, id).await
    }

    pub async fn fetch_payout(
        conn: &mut SqliteConnection,
        id: &PayoutId,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payout_requests WHERE id = ?",
            PAYOUT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(payout_from_row).transpose()
    }

    /// Payouts of one event, newest first.
    pub async fn list_payouts_for_event(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<PayoutRequest>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payout_requests WHERE event_id = ? ORDER BY requested_ms DESC, id ASC",
            PAYOUT_COLUMNS
        ))
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payout_from_row).collect()
    }

    /// Payouts requested by one organizer across all events, newest first.
    pub async fn list_payouts_for_organizer(
        &self,
        organizer: &MemberId,
    ) -> Result<Vec<PayoutRequest>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payout_requests WHERE organizer_id = ? ORDER BY requested_ms DESC, id ASC",
            PAYOUT_COLUMNS
        ))
        .bind(organizer.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payout_from_row).collect()
    }

    /// Record the reference returned synchronously by the transfer call,
    /// unless a notification already stored one.
    pub async fn record_transfer_reference(
        &self,
        id: &PayoutId,
        transfer_ref: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE payout_requests SET transfer_ref = ? WHERE id = ? AND transfer_ref IS NULL",
        )
        .bind(transfer_ref)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a payout that is still pending. Used only to compensate a
    /// transfer that was never started.
    pub async fn delete_pending_payout(
        conn: &mut SqliteConnection,
        id: &PayoutId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM payout_requests WHERE id = ? AND status = 'pending'")
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `pending -> in_transit`.
    pub async fn mark_payout_in_transit(
        conn: &mut SqliteConnection,
        id: &PayoutId,
        transfer_ref: Option<&str>,
        expected: Option<TimeMs>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = 'in_transit',
                transfer_ref = COALESCE(?, transfer_ref),
                expected_ms = COALESCE(?, expected_ms)
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(transfer_ref)
        .bind(expected.map(|t| t.as_ms()))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `pending | in_transit -> paid`.
    pub async fn mark_payout_paid(
        conn: &mut SqliteConnection,
        id: &PayoutId,
        arrived: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = 'paid', arrived_ms = ?
            WHERE id = ? AND status IN ('pending', 'in_transit')
            "#,
        )
        .bind(arrived.as_ms())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `pending | in_transit -> failed`.
    pub async fn mark_payout_failed(
        conn: &mut SqliteConnection,
        id: &PayoutId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = 'failed', failure_reason = ?
            WHERE id = ? AND status IN ('pending', 'in_transit')
            "#,
        )
        .bind(reason)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
