use actix_web::http::header::HeaderMap;
use secrecy::{ExposeSecret, Secret};

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Missing or malformed Authorization header.")]
    MissingCredentials,
    #[error("Invalid admin token.")]
    InvalidCredentials,
}

/// Explicit allow/deny check for admin-only actions. The caller hands in the
/// credential it extracted; no ambient session state is consulted.
pub fn authorize_admin(
    provided_token: Option<&str>,
    expected_token: &Secret<String>,
) -> Result<(), AuthError> {
    let provided_token = provided_token.ok_or(AuthError::MissingCredentials)?;

    if provided_token != expected_token.expose_secret() {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(())
}

/// Pulls the token out of a `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
