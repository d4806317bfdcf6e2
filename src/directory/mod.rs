//! Membership service abstraction: group rosters, admin roles, payout
//! destinations and contact details.

use crate::domain::{GroupId, MemberId};
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;

pub use http::HttpDirectory;
pub use mock::MockDirectory;

/// Read-only view of the membership service.
#[async_trait]
pub trait Directory: Send + Sync + fmt::Debug {
    /// Current members of a group.
    async fn list_members(&self, group_id: &GroupId) -> Result<Vec<MemberId>, DirectoryError>;

    async fn is_group_admin(
        &self,
        group_id: &GroupId,
        actor: &MemberId,
    ) -> Result<bool, DirectoryError>;

    /// The actor's payout destination account, only if it is verified.
    async fn payout_destination(&self, actor: &MemberId) -> Result<Option<String>, DirectoryError>;

    /// Contact address handed to the processor as the payer.
    async fn contact_email(&self, member: &MemberId) -> Result<Option<String>, DirectoryError>;
}

/// Error type for membership lookups.
#[derive(Debug, Clone)]
pub enum DirectoryError {
    NetworkError(String),
    HttpError { status: u16, message: String },
    ParseError(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DirectoryError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DirectoryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_error_display() {
        let err = DirectoryError::HttpError {
            status: 503,
            message: "Server error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 503: Server error");
        assert_eq!(
            DirectoryError::ParseError("bad".to_string()).to_string(),
            "Parse error: bad"
        );
    }
}
