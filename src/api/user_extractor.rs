use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::model::UserContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Author of the request, from the X-User-* headers. Requests without a
/// usable user id are attributed to the development user.
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

pub fn user_from_headers(headers: &HeaderMap) -> UserContext {
    match header_value(headers, USER_ID_HEADER) {
        Some(user_id) => UserContext::with_details(
            user_id,
            header_value(headers, USER_EMAIL_HEADER),
            header_value(headers, USER_NAME_HEADER),
        ),
        None => UserContext::default_user(),
    }
}

/// Trimmed header value; blank values count as absent
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
