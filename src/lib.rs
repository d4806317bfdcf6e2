pub mod api;
pub mod config;
pub mod db;
pub mod directory;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod processor;

pub use config::Config;
pub use db::{init_db, Repository};
pub use directory::{Directory, DirectoryError, HttpDirectory, MockDirectory};
pub use domain::{
    Contribution, ContributionId, ContributionStatus, Decimal, EventId, GroupId, MemberId,
    PaymentEvent, PayoutId, PayoutRequest, PayoutStatus, PoolSummary, TimeMs,
};
pub use error::AppError;
pub use ledger::{LedgerError, SettlementOutcome};
pub use processor::{HttpProcessor, MockProcessor, PaymentProcessor, ProcessorError};
