//! hoard-core - Hash-chained audit log for the hoard secret manager
//!
//! "A secret you can't audit is a secret you can't trust."
//!
//! Every action on the vault (keep, tell, forget) is appended as a
//! block to a proof-of-work hash chain. The current value of a secret
//! is never stored directly; it is derived by replaying the chain
//! backward. Tampering with any persisted block breaks the digest
//! linkage of every block after it.
//!
//! Confidentiality of the persisted chain is delegated to an external
//! sealing service (GPG sign + encrypt); this crate never does its own
//! cryptography beyond content hashing.

pub mod block;
pub mod chain;
pub mod digest;
pub mod error;
pub mod resolve;
pub mod seal;
pub mod store;

pub use block::{Block, BlockKind};
pub use chain::{Chain, KeySource, StaticKeys};
pub use error::ChainError;
pub use resolve::SecretRecord;
pub use seal::{GpgSealer, SealError, Sealer};
