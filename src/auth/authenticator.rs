use crate::auth::credentials::{Candidates, Credential};
use crate::config::AuthConfig;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

pub const REALM_CHALLENGE: &str = "Basic realm=\"Proxy Authentication Required\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Gate that compares presented credentials with the configured one.
///
/// Comparison is plain, case-sensitive string equality on both fields. There
/// is no rate limiting or lockout.
#[derive(Debug, Clone)]
pub struct Authenticator {
    expected: Credential,
}

impl Authenticator {
    pub fn new(auth: &AuthConfig) -> Self {
        Self {
            expected: Credential::new(auth.username.clone(), auth.password.clone()),
        }
    }

    /// Allows when either channel carries the expected credential.
    pub fn authorize(&self, candidates: &Candidates) -> Decision {
        let matches = |candidate: &Option<Credential>| candidate.as_ref() == Some(&self.expected);

        if matches(&candidates.basic) || matches(&candidates.proxy) {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// The 401 sent for a denied request.
    pub fn challenge() -> Response {
        ResponseBuilder::new(StatusCode::UNAUTHORIZED)
            .header("WWW-Authenticate", REALM_CHALLENGE)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body("Authentication required")
            .build()
    }
}
