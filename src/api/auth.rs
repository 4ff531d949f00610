use crate::api::api_error::APIError;
use crate::api::server::AppState;
use crate::error::Error;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Extractor that only succeeds if the request presents the configured API key, either as a
/// bearer token or as the username of basic credentials. Always succeeds when no key is
/// configured.
pub(super) struct Authorized;

#[async_trait::async_trait]
impl FromRequestParts<AppState> for Authorized {
    type Rejection = APIError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, APIError> {
        let Some(expected) = state.config.api.key.as_deref() else {
            return Ok(Authorized);
        };
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(api_key);
        match presented {
            Some(key) if key == expected => Ok(Authorized),
            _ => {
                tracing::debug!("rejected {} {}: bad API key", parts.method, parts.uri);
                Err(Error::Unauthorized.into())
            }
        }
    }
}

fn api_key(authorization: &str) -> Option<String> {
    let (scheme, credentials) = authorization.trim().split_once(' ')?;
    let credentials = credentials.trim();
    if scheme.eq_ignore_ascii_case("bearer") {
        return Some(credentials.to_string());
    }
    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = String::from_utf8(STANDARD.decode(credentials).ok()?).ok()?;
        let username = decoded.split_once(':').map_or(decoded.as_str(), |(user, _)| user);
        return Some(username.to_string());
    }
    None
}
