//! Contribution ledger rows.

use crate::domain::{
    Contribution, ContributionId, Decimal, EventId, MemberId, Settlement, StatusParseError, TimeMs,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{column_error, decode_decimal, decode_parsed, Repository};

const CONTRIBUTION_COLUMNS: &str = "id, event_id, member_id, amount_settled, status, method, \
     manual_delta, settlement_ref, session_ref, settled_ms";

fn contribution_from_row(row: &SqliteRow) -> Result<Contribution, sqlx::Error> {
    let method: Option<String> = row.try_get("method")?;
    let settlement = match method.as_deref() {
        None => None,
        Some("processor") => Some(Settlement::Processor {
            reference: row
                .try_get::<Option<String>, _>("settlement_ref")?
                .unwrap_or_default(),
        }),
        Some("manual") => Some(Settlement::Manual {
            delta: decode_decimal(row, "manual_delta")?,
        }),
        Some(other) => return Err(column_error("method", StatusParseError(other.to_string()))),
    };

    Ok(Contribution {
        id: decode_parsed(row, "id")?,
        event_id: decode_parsed(row, "event_id")?,
        member_id: MemberId::new(row.try_get::<String, _>("member_id")?),
        amount_settled: decode_decimal(row, "amount_settled")?,
        status: decode_parsed(row, "status")?,
        settlement,
        session_ref: row.try_get("session_ref")?,
        settled_ms: row.try_get::<Option<i64>, _>("settled_ms")?.map(TimeMs::new),
    })
}

impl Repository {
    /// Create a PENDING row for every member that has none yet.
    ///
    /// Existing rows are never touched. Returns the number of rows created.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn ensure_contributions(
        &self,
        event_id: &EventId,
        members: &[MemberId],
    ) -> Result<u64, sqlx::Error> {
        if members.is_empty() {
            return Ok(0);
        }

        let mut created = 0u64;
        let mut tx = self.pool.begin().await?;

        for member in members {
            let row = Contribution::pending(*event_id, member.clone());
            let result = sqlx::query(
                r#"
                INSERT INTO contributions (id, event_id, member_id, amount_settled, status)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(event_id, member_id) DO NOTHING
                "#,
            )
            .bind(row.id.to_string())
            .bind(event_id.to_string())
            .bind(member.as_str())
            .bind(row.amount_settled.to_canonical_string())
            .bind(row.status.as_str())
            .execute(&mut *tx)
            .await?;

            created += result.rows_affected();
        }

        tx.commit().await?;
        Ok(created)
    }

    /// All contributions of an event, ordered by member.
    pub async fn list_contributions(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<Contribution>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contributions WHERE event_id = ? ORDER BY member_id ASC",
            CONTRIBUTION_COLUMNS
        ))
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(contribution_from_row).collect()
    }

    pub async fn get_contribution(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_contribution(&mut conn, id).await
    }

    /// Read a contribution on the given connection (usually inside the
    /// transaction that is about to mutate it).
    pub async fn fetch_contribution(
        conn: &mut SqliteConnection,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contributions WHERE id = ?",
            CONTRIBUTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(contribution_from_row).transpose()
    }

    /// Look up the contribution currently holding a checkout session.
    pub async fn find_contribution_by_session(
        &self,
        session_ref: &str,
    ) -> Result<Option<Contribution>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contributions WHERE session_ref = ?",
            CONTRIBUTION_COLUMNS
        ))
        .bind(session_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(contribution_from_row).transpose()
    }

    /// Attach a new checkout session and (re)open the row as PENDING.
    ///
    /// Returns false if the row is PAID (or missing).
    pub async fn set_checkout_session(
        &self,
        id: &ContributionId,
        session_ref: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contributions
            SET session_ref = ?, status = 'pending'
            WHERE id = ? AND status != 'paid'
            "#,
        )
        .bind(session_ref)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a PENDING row still holding `session_ref` to FAILED.
    pub async fn expire_checkout_session(&self, session_ref: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contributions
            SET status = 'failed'
            WHERE session_ref = ? AND status = 'pending'
            "#,
        )
        .bind(session_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark a non-PAID row as settled by the processor.
    pub async fn mark_processor_settled(
        conn: &mut SqliteConnection,
        id: &ContributionId,
        amount_settled: Decimal,
        reference: &str,
        at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contributions
            SET amount_settled = ?, status = 'paid', method = 'processor',
                settlement_ref = ?, manual_delta = NULL, settled_ms = ?
            WHERE id = ? AND status != 'paid'
            "#,
        )
        .bind(amount_settled.to_canonical_string())
        .bind(reference)
        .bind(at.as_ms())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark a non-PAID row as settled by an admin, recording `delta` for undo.
    pub async fn mark_manual_settled(
        conn: &mut SqliteConnection,
        id: &ContributionId,
        amount_settled: Decimal,
        delta: Decimal,
        at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contributions
            SET amount_settled = ?, status = 'paid', method = 'manual',
                manual_delta = ?, settlement_ref = NULL, settled_ms = ?
            WHERE id = ? AND status != 'paid'
            "#,
        )
        .bind(amount_settled.to_canonical_string())
        .bind(delta.to_canonical_string())
        .bind(at.as_ms())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revert a manual settlement back to PENDING with the given amount.
    pub async fn clear_manual_settlement(
        conn: &mut SqliteConnection,
        id: &ContributionId,
        amount_settled: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contributions
            SET amount_settled = ?, status = 'pending', method = NULL,
                manual_delta = NULL, settled_ms = NULL
            WHERE id = ? AND method = 'manual'
            "#,
        )
        .bind(amount_settled.to_canonical_string())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
