// Error types shared by the codec, miner and storage layers

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Difficulty text is empty or contains anything but ASCII digits
    #[error("invalid difficulty: {0:?}")]
    InvalidDifficulty(String),

    /// Difficulty parsed to zero
    #[error("difficulty is zero")]
    DivisionByZero,

    /// A fixed-width field could not be read in full
    #[error("record truncated while reading {field}")]
    TruncatedRecord { field: &'static str },

    /// A length prefix in a block or transaction record is out of range
    #[error("malformed record: bad {field}")]
    MalformedRecord { field: &'static str },

    /// Block record written by an unknown protocol version
    #[error("unsupported block version {0}")]
    UnsupportedVersion(i32),

    /// Transaction digest trailer is not a multiple of 32 bytes
    #[error("transaction trailer of {len} bytes is not a multiple of 32")]
    MalformedTrailer { len: usize },

    /// Key absent from a store
    #[error("key not found")]
    NotFound,

    /// A length prefix in the log is negative
    #[error("corrupt log record at offset {offset}")]
    CorruptLog { offset: u64 },

    /// Block merkle root does not commit to its transaction list
    #[error("merkle root does not match transactions")]
    MerkleMismatch,

    /// Malformed key or digest text
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Underlying file or database failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
