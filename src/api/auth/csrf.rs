//! OAuth state handling for CSRF protection.
//!
//! The state token lives only in the `oauth_state` cookie and in the `state`
//! parameter of the authorization URL. Nothing is kept server-side: the
//! callback compares the two and always clears the cookie, so a state value
//! is good for at most one callback.

use axum_extra::extract::cookie::{Cookie, SameSite};
use rand::{rngs::OsRng, RngCore};

/// Cookie carrying the CSRF state between login and callback
pub const STATE_COOKIE: &str = "oauth_state";

/// Random bytes per state token (hex encoded to 64 characters)
const STATE_BYTES: usize = 32;

/// One-time anti-forgery token for a single authorization attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfState(String);

impl CsrfState {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generates a new high-entropy state token.
pub fn issue() -> CsrfState {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    CsrfState(hex::encode(bytes))
}

/// Checks the state returned by the provider against the cookie.
///
/// Both values must be present, non-empty and byte-equal. A missing value
/// is a failure, never a reason to skip the check.
pub fn validate(cookie_value: Option<&str>, callback_state: Option<&str>) -> bool {
    match (cookie_value, callback_state) {
        (Some(cookie), Some(param)) if !cookie.is_empty() => cookie.as_bytes() == param.as_bytes(),
        _ => false,
    }
}

/// `oauth_state` cookie for a freshly issued state.
pub fn state_cookie(state: &CsrfState, ttl_seconds: i64) -> Cookie<'static> {
    secure_cookie(STATE_COOKIE, state.as_str().to_string(), ttl_seconds)
}

/// Expired `oauth_state` cookie with the same attributes, clearing it.
pub fn clear_state_cookie() -> Cookie<'static> {
    secure_cookie(STATE_COOKIE, String::new(), 0)
}

/// Builds a cookie with the attributes every auth cookie carries.
pub(crate) fn secure_cookie(name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}
