use std::fmt;

use zeroize::Zeroizing;

/// Name of the cookie the authentication service issues.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Opaque session credential. The client never decodes it; it is only
/// replayed as the session cookie.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = Zeroizing::new(token.into());
        if token.trim().is_empty() {
            return None;
        }
        Some(Self(token))
    }

    pub(crate) fn cookie_header(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("{SESSION_COOKIE_NAME}={}", self.0.as_str()))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}
