//! Workspace credentials.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of characters in a generated credential.
pub const DEFAULT_CREDENTIAL_LENGTH: usize = 24;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                        abcdefghijklmnopqrstuvwxyz\
                        0123456789";

/// Opaque secret protecting one workspace instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Produces fresh credentials from the thread-local CSPRNG.
#[derive(Debug, Clone)]
pub struct CredentialGenerator {
    length: usize,
}

impl CredentialGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    pub fn generate(&self) -> Credential {
        let mut rng = rand::rng();
        let secret = (0..self.length)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect::<String>();

        Credential(secret)
    }
}

impl Default for CredentialGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_LENGTH)
    }
}
