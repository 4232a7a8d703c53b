//! Bearer-token guard for the `/v1` routes.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{error::AppError, state::AppState};

/// Checks an `Authorization` header against the expected token. An empty
/// expected token rejects every request.
pub fn authorize(expected: &str, header: Option<&HeaderValue>) -> Result<(), AppError> {
    let provided = header
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if !expected.is_empty() && token == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state.api_token, req.headers().get(AUTHORIZATION))?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejects_everything() {
        let empty = HeaderValue::from_static("Bearer ");
        assert!(matches!(authorize("", None), Err(AppError::Unauthorized)));
        assert!(matches!(authorize("", Some(&empty)), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_bearer_token_checked() {
        let good = HeaderValue::from_static("Bearer secret");
        let bad = HeaderValue::from_static("Bearer nope");
        let basic = HeaderValue::from_static("Basic secret");

        assert!(authorize("secret", Some(&good)).is_ok());
        assert!(matches!(authorize("secret", Some(&bad)), Err(AppError::Unauthorized)));
        assert!(matches!(authorize("secret", Some(&basic)), Err(AppError::Unauthorized)));
        assert!(matches!(authorize("secret", None), Err(AppError::Unauthorized)));
    }
}
