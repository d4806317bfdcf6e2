//! HTTP client for the membership service.

use super::{Directory, DirectoryError};
use crate::domain::{GroupId, MemberId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// Membership service client.
///
/// Endpoints:
/// - `GET /groups/{group}/members` -> `{"members": ["id", ...]}`
/// - `GET /groups/{group}/admins/{member}` -> 200 `{"admin": bool}`, 404 if not an admin
/// - `GET /members/{member}` -> `{"email": ..., "payoutDestination": {"accountId": ..., "verified": bool}}`
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: Client,
    base_url: String,
    max_retry: Duration,
}

impl HttpDirectory {
    pub fn new(base_url: String, max_retry: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            max_retry,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DirectoryError::ParseError(format!("base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::ParseError("base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document; a 404 is `Ok(None)`.
    async fn get_json(&self, url: Url) -> Result<Option<serde_json::Value>, DirectoryError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(url.clone()).send().await.map_err(|e| {
                backoff::Error::transient(DirectoryError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(backoff::Error::transient(DirectoryError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DirectoryError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map(Some)
                .map_err(|e| backoff::Error::permanent(DirectoryError::ParseError(e.to_string())))
        })
        .await
    }

    async fn get_member(&self, member: &MemberId) -> Result<Option<serde_json::Value>, DirectoryError> {
        let url = self.url(&["members", member.as_str()])?;
        self.get_json(url).await
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn list_members(&self, group_id: &GroupId) -> Result<Vec<MemberId>, DirectoryError> {
        debug!(group_id = %group_id, "Listing group members");
        let url = self.url(&["groups", group_id.as_str(), "members"])?;
        match self.get_json(url).await? {
            Some(json) => parse_members(&json),
            None => Ok(Vec::new()),
        }
    }

    async fn is_group_admin(
        &self,
        group_id: &GroupId,
        actor: &MemberId,
    ) -> Result<bool, DirectoryError> {
        let url = self.url(&["groups", group_id.as_str(), "admins", actor.as_str()])?;
        Ok(self
            .get_json(url)
            .await?
            .and_then(|json| json.get("admin").and_then(|v| v.as_bool()))
            .unwrap_or(false))
    }

    async fn payout_destination(&self, actor: &MemberId) -> Result<Option<String>, DirectoryError> {
        Ok(self
            .get_member(actor)
            .await?
            .and_then(|json| parse_verified_destination(&json)))
    }

    async fn contact_email(&self, member: &MemberId) -> Result<Option<String>, DirectoryError> {
        Ok(self.get_member(member).await?.and_then(|json| {
            json.get("email")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }))
    }
}

/// Accepts `{"members": [...]}` or a bare array, of ids or `{"id": ...}` objects.
fn parse_members(json: &serde_json::Value) -> Result<Vec<MemberId>, DirectoryError> {
    let items = json
        .get("members")
        .unwrap_or(json)
        .as_array()
        .ok_or_else(|| DirectoryError::ParseError("Expected members array".to_string()))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .or_else(|| item.get("id").and_then(|v| v.as_str()))
                .map(MemberId::new)
                .ok_or_else(|| DirectoryError::ParseError(format!("Invalid member entry: {}", item)))
        })
        .collect()
}

fn parse_verified_destination(json: &serde_json::Value) -> Option<String> {
    let destination = json.get("payoutDestination")?;
    let verified = destination
        .get("verified")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !verified {
        return None;
    }
    destination
        .get("accountId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
