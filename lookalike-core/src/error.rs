use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookalikeError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Fingerprint length mismatch: {left} bits vs {right} bits")]
    FingerprintLengthMismatch { left: u32, right: u32 },

    #[error("Corpus store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LookalikeError>;
