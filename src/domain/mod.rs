//! Domain types for the dues pool ledger.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Identifier newtypes and TimeMs
//! - Payment events, contributions and payout requests with their status rules
//! - Display summaries computed from persisted rows

pub mod contribution;
pub mod decimal;
pub mod event;
pub mod payout;
pub mod primitives;
pub mod summary;

pub use contribution::{Contribution, ContributionStatus, Settlement, StatusParseError};
pub use decimal::Decimal;
pub use event::PaymentEvent;
pub use payout::{PayoutRequest, PayoutStatus};
pub use primitives::{ContributionId, EventId, GroupId, IdParseError, MemberId, PayoutId, TimeMs};
pub use summary::{PayoutTotals, PoolSummary};
