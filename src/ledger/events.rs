//! Event scheduling, summaries and group teardown.

use crate::db::Repository;
use crate::directory::Directory;
use crate::domain::{Decimal, EventId, GroupId, MemberId, PaymentEvent, PoolSummary, TimeMs};
use std::sync::Arc;
use tracing::{info, warn};

use super::{authorize_reader, require_positive, LedgerError};

#[derive(Debug, Clone)]
pub struct EventRegistry {
    repo: Arc<Repository>,
    directory: Arc<dyn Directory>,
}

impl EventRegistry {
    pub fn new(repo: Arc<Repository>, directory: Arc<dyn Directory>) -> Self {
        Self { repo, directory }
    }

    /// Schedule a collection for a group. The scheduling admin becomes the
    /// organizer and every current member gets a PENDING row.
    pub async fn schedule_event(
        &self,
        group_id: GroupId,
        actor: &MemberId,
        per_member_amount: Decimal,
        due_ms: TimeMs,
    ) -> Result<PaymentEvent, LedgerError> {
        if !self.directory.is_group_admin(&group_id, actor).await? {
            return Err(LedgerError::NotGroupAdmin);
        }
        let per_member_amount = require_positive(per_member_amount)?;

        let event = PaymentEvent::new(group_id, actor.clone(), per_member_amount, due_ms);
        self.repo.insert_event(&event).await?;

        let members = self.directory.list_members(&event.group_id).await?;
        let created = self.repo.ensure_contributions(&event.id, &members).await?;

        info!(
            event_id = %event.id,
            group_id = %event.group_id,
            organizer = %event.organizer_id,
            per_member_amount = %event.per_member_amount,
            contributions = created,
            "Event scheduled"
        );
        Ok(event)
    }

    /// Event plus summary, for any reader of the group.
    pub async fn get_event(
        &self,
        event_id: &EventId,
        actor: &MemberId,
    ) -> Result<(PaymentEvent, PoolSummary), LedgerError> {
        let (event, summary) = self.summary(event_id).await?;
        authorize_reader(self.directory.as_ref(), &event, actor).await?;
        Ok((event, summary))
    }

    /// Current event row and summary, without an access check.
    pub async fn summary(
        &self,
        event_id: &EventId,
    ) -> Result<(PaymentEvent, PoolSummary), LedgerError> {
        let event = self
            .repo
            .get_event(event_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("event {}", event_id)))?;

        let (contributions, payouts) = futures::try_join!(
            self.repo.list_contributions(event_id),
            self.repo.list_payouts_for_event(event_id),
        )?;

        let summary = PoolSummary::compute(&event, &contributions, &payouts);
        if !summary.is_consistent() {
            warn!(
                event_id = %event_id,
                balance = %summary.balance,
                total_settled = %summary.total_settled,
                total_paid_out = %summary.total_paid_out,
                "Pool balance disagrees with ledger rows"
            );
        }
        Ok((event, summary))
    }

    /// Remove every event of a group along with its contributions and payouts.
    ///
    /// Refused while any payout of the group is still in flight, since its
    /// outcome could no longer be reconciled.
    pub async fn delete_group_events(
        &self,
        group_id: &GroupId,
        actor: &MemberId,
    ) -> Result<u64, LedgerError> {
        if !self.directory.is_group_admin(group_id, actor).await? {
            return Err(LedgerError::NotGroupAdmin);
        }

        let mut tx = self.repo.begin().await?;
        Repository::lock_group_events(&mut *tx, group_id).await?;
        if Repository::count_in_flight_payouts_for_group(&mut *tx, group_id).await? > 0 {
            return Err(LedgerError::PayoutInFlight);
        }
        let deleted = Repository::delete_events_for_group(&mut *tx, group_id).await?;
        tx.commit().await?;

        info!(group_id = %group_id, deleted, actor = %actor, "Group events deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::directory::MockDirectory;
    use tempfile::TempDir;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    async fn registry() -> (EventRegistry, Arc<Repository>, TempDir) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("test.db").to_string_lossy().to_string();
        let repo = Arc::new(Repository::new(init_db(&db_path).await.unwrap()));
        let directory = Arc::new(
            MockDirectory::new()
                .with_admin("g1", "admin")
                .with_member("g1", "alice"),
        );
        (EventRegistry::new(repo.clone(), directory), repo, temp)
    }

    #[tokio::test]
    async fn test_schedule_creates_rows_for_members() {
        let (registry, repo, _temp) = registry().await;
        let event = registry
            .schedule_event(GroupId::new("g1"), &MemberId::new("admin"), dec("20"), TimeMs::new(1))
            .await
            .unwrap();

        assert!(event.is_organizer(&MemberId::new("admin")));
        assert_eq!(repo.list_contributions(&event.id).await.unwrap().len(), 2);

        let (_, summary) = registry
            .get_event(&event.id, &MemberId::new("alice"))
            .await
            .unwrap();
        assert!(summary.balance.is_zero());
        assert!(summary.is_consistent());
    }

    #[tokio::test]
    async fn test_schedule_requires_admin_and_positive_amount() {
        let (registry, _repo, _temp) = registry().await;

        let err = registry
            .schedule_event(GroupId::new("g1"), &MemberId::new("alice"), dec("20"), TimeMs::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotGroupAdmin));

        let err = registry
            .schedule_event(GroupId::new("g1"), &MemberId::new("admin"), dec("0"), TimeMs::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_delete_group_events_cascades() {
        let (registry, repo, _temp) = registry().await;
        let admin = MemberId::new("admin");
        let event = registry
            .schedule_event(GroupId::new("g1"), &admin, dec("20"), TimeMs::new(1))
            .await
            .unwrap();

        let deleted = registry
            .delete_group_events(&GroupId::new("g1"), &admin)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.get_event(&event.id).await.unwrap().is_none());
        assert!(repo.list_contributions(&event.id).await.unwrap().is_empty());
    }
}
