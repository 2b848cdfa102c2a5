//! Error taxonomy for the chain core
//!
//! Three fatal classes: integrity (the chain disagrees with its own
//! digests), sealing (the external sign/encrypt service failed), and
//! contract (a caller asked for something structurally impossible).
//! A missing secret is NOT an error - resolution returns `None` and
//! callers map that to a quiet non-zero exit.

use thiserror::Error;

use crate::seal::SealError;

/// Fatal failures of the chain core.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The chain failed validation or could not be decoded.
    #[error("integrity failure: {0}")]
    Integrity(String),

    /// The external sealing service refused to seal or unseal.
    #[error(transparent)]
    Sealing(#[from] SealError),

    /// Key selection for a genesis block did not produce identities.
    #[error("key selection failed: {0}")]
    KeySelection(String),

    /// Caller bug: a structurally invalid request (e.g. genesis on a
    /// non-empty chain).
    #[error("contract violation: {0}")]
    Contract(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
