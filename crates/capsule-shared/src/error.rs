use thiserror::Error;

/// Errors from parsing text-encoded identifiers (keys, topics, packages).
#[derive(Error, Debug)]
pub enum ParseIdError {
    /// Hex decoding error.
    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Decoded value has the wrong length.
    #[error("Expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Errors from identity and signature operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Public key bytes do not form a valid Ed25519 point.
    #[error("Invalid public key bytes")]
    InvalidKeyBytes,

    /// Signature does not verify against the claimed sender.
    #[error("Signature verification failed")]
    InvalidSignature,
}
