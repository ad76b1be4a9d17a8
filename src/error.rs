use thiserror::Error;

/// Why a short code or token was rejected before any cryptographic check ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// A byte outside `0-9a-zA-Z`.
    InvalidCharacter { byte: u8, position: usize },
    /// Empty input, or input longer than any code this crate issues.
    InvalidLength,
    /// Decoded payload shorter than the integrity tag it must carry.
    TooShort,
    /// The framing byte in front of a variable-length payload was wrong.
    MarkerMismatch { received: u8, expected: u8 },
    /// Value does not fit in 64 bits.
    Overflow,
}

/// Error returned by every decode and resolve path.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("malformed input: {0:?}")]
    Malformed(MalformedKind),

    #[error("integrity check failed")]
    TamperDetected,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("corrupted data")]
    CorruptedData,

    #[error("link not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Stable label for logs and metrics. Tamper detection and malformed
    /// input look the same to callers but never share a label.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Malformed(_) => "malformed_input",
            Error::TamperDetected => "tamper_detected",
            Error::DecryptionFailed => "decryption_error",
            Error::EncryptionFailed => "encryption_error",
            Error::CorruptedData => "corrupted_data",
            Error::NotFound => "not_found",
            Error::Store(_) => "store_error",
        }
    }
}

impl From<MalformedKind> for Error {
    fn from(kind: MalformedKind) -> Error {
        Error::Malformed(kind)
    }
}
