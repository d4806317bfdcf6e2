//! Payment event: one dues collection for a group.

use crate::domain::{Decimal, EventId, GroupId, MemberId, TimeMs};
use serde::{Deserialize, Serialize};

/// One dues collection for the members of a group.
///
/// `pool_balance` is only ever written by the accumulator, inside the same
/// transaction as the contribution or payout row that justifies the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: EventId,
    pub group_id: GroupId,
    pub organizer_id: MemberId,
    /// Target amount each member is asked to contribute.
    pub per_member_amount: Decimal,
    pub due_ms: TimeMs,
    pub pool_balance: Decimal,
    /// Bumped every time a transaction takes the pool lock.
    pub version: i64,
    pub created_ms: TimeMs,
}

impl PaymentEvent {
    /// A freshly scheduled event with an empty pool.
    pub fn new(
        group_id: GroupId,
        organizer_id: MemberId,
        per_member_amount: Decimal,
        due_ms: TimeMs,
    ) -> Self {
        Self {
            id: EventId::generate(),
            group_id,
            organizer_id,
            per_member_amount,
            due_ms,
            pool_balance: Decimal::zero(),
            version: 0,
            created_ms: TimeMs::now(),
        }
    }

    pub fn is_organizer(&self, actor: &MemberId) -> bool {
        &self.organizer_id == actor
    }
}
