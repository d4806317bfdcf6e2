//! In-memory membership directory for tests and local runs.

use super::{Directory, DirectoryError};
use crate::domain::{GroupId, MemberId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    members: HashMap<GroupId, Vec<MemberId>>,
    admins: HashSet<(GroupId, MemberId)>,
    destinations: HashMap<MemberId, String>,
    emails: HashMap<MemberId, String>,
}

/// Mock directory populated through builder methods.
///
/// Membership can also be changed after construction to simulate members
/// joining a group between two reads.
#[derive(Debug, Default)]
pub struct MockDirectory {
    state: RwLock<State>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, group: &str, member: &str) -> Self {
        self.add_member(group, member);
        self
    }

    /// Add an admin; admins are members too.
    pub fn with_admin(self, group: &str, member: &str) -> Self {
        self.add_member(group, member);
        if let Ok(mut state) = self.state.write() {
            state
                .admins
                .insert((GroupId::new(group), MemberId::new(member)));
        }
        self
    }

    /// Give `member` a verified payout destination.
    pub fn with_payout_destination(self, member: &str, account_id: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state
                .destinations
                .insert(MemberId::new(member), account_id.to_string());
        }
        self
    }

    pub fn with_email(self, member: &str, email: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.emails.insert(MemberId::new(member), email.to_string());
        }
        self
    }

    pub fn add_member(&self, group: &str, member: &str) {
        if let Ok(mut state) = self.state.write() {
            let roster = state.members.entry(GroupId::new(group)).or_default();
            let member = MemberId::new(member);
            if !roster.contains(&member) {
                roster.push(member);
            }
        }
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn list_members(&self, group_id: &GroupId) -> Result<Vec<MemberId>, DirectoryError> {
        let state = self
            .state
            .read()
            .map_err(|_| DirectoryError::NetworkError("mock directory poisoned".to_string()))?;
        Ok(state.members.get(group_id).cloned().unwrap_or_default())
    }

    async fn is_group_admin(
        &self,
        group_id: &GroupId,
        actor: &MemberId,
    ) -> Result<bool, DirectoryError> {
        let state = self
            .state
            .read()
            .map_err(|_| DirectoryError::NetworkError("mock directory poisoned".to_string()))?;
        Ok(state.admins.contains(&(group_id.clone(), actor.clone())))
    }

    async fn payout_destination(&self, actor: &MemberId) -> Result<Option<String>, DirectoryError> {
        let state = self
            .state
            .read()
            .map_err(|_| DirectoryError::NetworkError("mock directory poisoned".to_string()))?;
        Ok(state.destinations.get(actor).cloned())
    }

    async fn contact_email(&self, member: &MemberId) -> Result<Option<String>, DirectoryError> {
        let state = self
            .state
            .read()
            .map_err(|_| DirectoryError::NetworkError("mock directory poisoned".to_string()))?;
        Ok(state.emails.get(member).cloned())
    }
}
