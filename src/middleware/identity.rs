use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;

/// Verifies the bearer credential, if any, and injects the resulting
/// [`crate::auth::Identity`]. A request without an Authorization header goes
/// through with no identity; a header that is present but unusable is refused.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(request.headers())? {
        let identity = state.tokens.verify(&token).map_err(|e| {
            tracing::warn!("Rejected bearer credential: {}", e);
            ApiError::from(e)
        })?;
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::unauthorized("Empty bearer token")),
        None => Err(ApiError::unauthorized(
            "Authorization header must use Bearer token format",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn missing_header_is_not_an_error() {
        assert_eq!(extract_bearer(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")).unwrap().as_deref(), Some("abc.def"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert!(extract_bearer(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(extract_bearer(&headers("Bearer   ")).is_err());
    }
}
