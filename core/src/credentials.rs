//! Password checks used by sign-in.

use subtle::ConstantTimeEq;

/// Decides whether a supplied password matches what the API holds for a
/// person.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, stored: Option<&str>, supplied: &str) -> bool;
}

/// Compares against the secret stored on the person record. A record with
/// no stored secret accepts any password.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredSecretVerifier;

impl CredentialVerifier for StoredSecretVerifier {
    fn verify(&self, stored: Option<&str>, supplied: &str) -> bool {
        match stored {
            None | Some("") => true,
            Some(stored) => stored.as_bytes().ct_eq(supplied.as_bytes()).into(),
        }
    }
}
