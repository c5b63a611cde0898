//! Bearer token guard for the agent API.
//!
//! When `AGENT_API_KEY` is unset every request is let through.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Extractor that rejects requests without the configured bearer token.
///
/// ```ignore
/// async fn handler(_auth: Authorized) -> impl IntoResponse { /* ... */ }
/// ```
pub struct Authorized;

#[axum::async_trait]
impl FromRequestParts<AppState> for Authorized {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.api_key.as_deref() else {
            return Ok(Authorized);
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        if token != expected {
            return Err(AppError::Unauthorized);
        }

        Ok(Authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support;
    use axum::http::Request;

    fn parts(auth_header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/opportunities");
        if let Some(value) = auth_header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_no_key_configured_allows_all() {
        let (state, _) = test_support::state(None);
        let result = Authorized::from_request_parts(&mut parts(None), &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_valid_token() {
        let (state, _) = test_support::state(Some("dev-key"));
        let result =
            Authorized::from_request_parts(&mut parts(Some("Bearer dev-key")), &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token() {
        let (state, _) = test_support::state(Some("dev-key"));

        for header in [None, Some("Bearer nope"), Some("dev-key")] {
            let result = Authorized::from_request_parts(&mut parts(header), &state).await;
            assert!(matches!(result, Err(AppError::Unauthorized)));
        }
    }
}
