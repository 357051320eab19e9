//! Connection credential verification.
//!
//! The authenticated endpoint reads a token from the `token` cookie and asks
//! a [`TokenVerifier`] whether it is acceptable. Verification happens before
//! any broker or flow resources are allocated.

use relay_core::RelayError;
use tracing::warn;

/// Decides whether a presented credential is acceptable.
#[cfg_attr(test, mockall::automock)]
pub trait TokenVerifier: Send + Sync {
    /// Whether `token` grants access.
    fn verify(&self, token: &str) -> bool;
}

/// Accepts exactly one configured token.
///
/// With no token configured every credential is rejected.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    expected: Option<String>,
}

impl StaticTokenVerifier {
    /// Verifier for `expected`; `None` rejects everything.
    pub fn new(expected: Option<String>) -> Self {
        Self { expected }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> bool {
        self.expected.as_deref().is_some_and(|expected| {
            // Length leaks, contents don't.
            expected.len() == token.len()
                && expected
                    .bytes()
                    .zip(token.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        })
    }
}

/// Check an optional credential, failing with [`RelayError::AuthorizationFailed`].
pub fn authorize(verifier: &dyn TokenVerifier, token: Option<&str>) -> Result<(), RelayError> {
    match token {
        Some(token) if verifier.verify(token) => Ok(()),
        Some(_) => {
            warn!("credential mismatch");
            Err(RelayError::AuthorizationFailed)
        }
        None => {
            warn!("credential missing");
            Err(RelayError::AuthorizationFailed)
        }
    }
}
