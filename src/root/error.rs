use thiserror::Error;

/// Errors raised while decoding a ROOT file.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("not a ROOT file (bad magic)")]
    BadMagic,

    #[error("buffer underflow at offset {offset}: need {need} bytes, have {have}")]
    BufferUnderflow { offset: usize, need: usize, have: usize },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("unsupported object class: {0}")]
    UnsupportedClass(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RootError>;
