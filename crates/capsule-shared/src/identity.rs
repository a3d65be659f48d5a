use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::IdentityError;
use crate::types::UserId;

/// The device's cryptographic identity based on Ed25519.
/// The public key serves as the user ID and signs peer advertisements.
/// Key storage belongs to the embedding application, which hands the
/// identity in at startup.
#[derive(Clone)]
pub struct HostIdentity {
    signing_key: SigningKey,
}

impl HostIdentity {
    /// Generate a new random identity
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Get the user ID (public key)
    pub fn user_id(&self) -> UserId {
        UserId(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the raw public key bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

/// Verify a signature against a public key
pub fn verify_signature(
    pubkey_bytes: &[u8; 32],
    message: &[u8],
    signature: &Signature,
) -> Result<(), IdentityError> {
    let verifying_key =
        VerifyingKey::from_bytes(pubkey_bytes).map_err(|_| IdentityError::InvalidKeyBytes)?;
    verifying_key
        .verify(message, signature)
        .map_err(|_| IdentityError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_generation() {
        let id = HostIdentity::generate();
        assert_eq!(id.user_id().0.len(), 32);
    }

    #[test]
    fn test_distinct_identities() {
        let a = HostIdentity::generate();
        let b = HostIdentity::generate();
        assert_ne!(a.user_id(), b.user_id());
    }

    #[test]
    fn test_sign_verify() {
        let id = HostIdentity::generate();
        let message = b"capsule advert";
        let signature = id.sign(message);

        assert!(verify_signature(&id.public_key_bytes(), message, &signature).is_ok());
        assert!(verify_signature(&id.public_key_bytes(), b"wrong", &signature).is_err());
    }
}
