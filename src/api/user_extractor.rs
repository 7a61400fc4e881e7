use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::UserContext;

/// Axum extractor for the coordinator behind a decision
///
/// - X-User-Id: user identifier written into the conflict notes
/// - X-User-Name: optional display name, preferred in the notes
///
/// Without headers the action is attributed to the system user.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(user_from_headers(&parts.headers))
    }
}

fn user_from_headers(headers: &HeaderMap) -> UserContext {
    match extract_header_value(headers, "x-user-id") {
        Some(user_id) => UserContext::with_name(user_id, extract_header_value(headers, "x-user-name")),
        None => UserContext::system(),
    }
}

/// Extract header value as string, blank values count as missing
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
