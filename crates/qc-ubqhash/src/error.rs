//! Error types for the ubqhash engine

use thiserror::Error;

/// Result type alias for ubqhash operations
pub type Result<T> = std::result::Result<T, UbqhashError>;

/// Errors that can occur while generating epoch data or checking seals
#[derive(Debug, Error)]
pub enum UbqhashError {
    /// Dump file header does not carry the expected magic words
    #[error("invalid dump magic")]
    InvalidDumpMagic,

    /// Dump file is too short to even hold the header
    #[error("dump file too short: {len} bytes")]
    DumpTooShort {
        /// Length of the file on disk
        len: u64,
    },

    /// Dump payload does not have the size of the expected item
    #[error("dump payload is {actual} bytes, expected {expected}")]
    InvalidDumpSize {
        /// Payload bytes the item needs
        expected: u64,
        /// Payload bytes found on disk
        actual: u64,
    },

    /// Filesystem or mapping failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header difficulty is zero
    #[error("non-positive difficulty")]
    InvalidDifficulty,

    /// Recomputed mix digest differs from the header's
    #[error("invalid mix digest")]
    InvalidMixDigest,

    /// Proof-of-work result is above the difficulty target
    #[error("invalid proof-of-work")]
    InvalidPow,

    /// Remote sealer has not received any work package yet
    #[error("no mining work available yet")]
    NoMiningWork,

    /// Remote sealer thread is gone
    #[error("remote sealer stopped")]
    SealerStopped,

    /// Operation needs a remote sealer and this engine has none
    #[error("not supported")]
    NotSupported,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl UbqhashError {
    /// Check if error is recoverable locally (regenerate, retry later)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidDumpMagic
                | Self::DumpTooShort { .. }
                | Self::InvalidDumpSize { .. }
                | Self::Io(_)
                | Self::NoMiningWork
        )
    }

    /// Check if error rejects a block seal
    pub fn is_seal_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidDifficulty | Self::InvalidMixDigest | Self::InvalidPow
        )
    }
}
