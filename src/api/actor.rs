use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::MemberId;
use crate::error::AppError;

/// Header carrying the authenticated caller, set by the auth gateway in front
/// of this service.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The member making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub MemberId);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Actor(MemberId::new(v)))
            .ok_or_else(|| AppError::Unauthorized("Missing X-Actor-Id header".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, AppError> {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_from_header() {
        let request = Request::builder()
            .header("X-Actor-Id", " alice ")
            .body(())
            .unwrap();
        let Actor(member) = extract(request).await.unwrap();
        assert_eq!(member, MemberId::new("alice"));
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));

        let request = Request::builder().header("X-Actor-Id", "").body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));
    }
}
