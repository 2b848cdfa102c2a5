//! Chain - append-only block sequence, miner and validator
//!
//! The chain is an explicit value owned by the command execution
//! context; it is loaded once, mutated by at most one append, and
//! sealed back to disk at the commit point. No global state.

use std::io::Write as _;

use chrono::Utc;

use crate::block::{Block, BlockKind};
use crate::digest::{random_nonce, DIFFICULTY_PREFIX, NULL_DIGEST};
use crate::error::ChainError;

/// Mining attempts between progress ticks on stderr.
const PROGRESS_INTERVAL: u64 = 64;

/// Supplies the signing and encryption identities for a genesis block.
///
/// Implemented interactively by the CLI (gpg key listing + prompt) and
/// by [`StaticKeys`] when identities are given up front.
pub trait KeySource {
    fn select(&self) -> Result<(String, String), ChainError>;
}

/// Fixed signing/encryption identities, no interaction.
pub struct StaticKeys {
    pub signing: String,
    pub encryption: String,
}

impl KeySource for StaticKeys {
    fn select(&self) -> Result<(String, String), ChainError> {
        Ok((self.signing.clone(), self.encryption.clone()))
    }
}

/// The append-only audit log.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Signing and encryption identities recorded in the genesis block.
    pub fn genesis_keys(&self) -> Option<(&str, &str)> {
        let first = self.blocks.first()?;
        if first.kind != BlockKind::Genesis {
            return None;
        }
        Some((first.params[0].as_str(), first.params[1].as_str()))
    }

    /// Append a block of `kind` with `params`, mining a valid digest.
    ///
    /// On an empty chain a genesis block is synthesized first (keys
    /// drawn from `keys`) unless the request itself is a genesis.
    /// Requesting a genesis on a non-empty chain is a caller bug.
    pub fn append(
        &mut self,
        kind: BlockKind,
        params: Vec<String>,
        actor: &str,
        keys: &dyn KeySource,
    ) -> Result<&Block, ChainError> {
        if kind == BlockKind::Genesis {
            if !self.is_empty() {
                return Err(ChainError::Contract("genesis block on a non-empty chain"));
            }
        } else if self.is_empty() {
            let (signing, encryption) = keys.select()?;
            self.mine(BlockKind::Genesis, vec![signing, encryption], actor);
        }

        Ok(self.mine(kind, params, actor))
    }

    /// The only place a block is ever added. Content (including the
    /// timestamp) is built once; only the nonce changes across attempts.
    fn mine(&mut self, kind: BlockKind, params: Vec<String>, actor: &str) -> &Block {
        let prev_digest = self
            .blocks
            .last()
            .map(|b| b.digest.clone())
            .unwrap_or_else(|| NULL_DIGEST.to_string());

        let mut block = Block {
            kind,
            actor: actor.to_string(),
            timestamp: Utc::now().timestamp(),
            params,
            nonce: String::new(),
            digest: String::new(),
        };

        let mut attempts: u64 = 0;
        loop {
            block.nonce = random_nonce();
            let candidate = block.chained_digest(&prev_digest);
            if candidate.starts_with(DIFFICULTY_PREFIX) {
                block.digest = candidate;
                break;
            }
            attempts += 1;
            if attempts % PROGRESS_INTERVAL == 0 {
                // Advisory progress only, never on stdout.
                eprint!(".");
                let _ = std::io::stderr().flush();
            }
        }
        if attempts >= PROGRESS_INTERVAL {
            eprintln!();
        }

        let index = self.blocks.len();
        self.blocks.push(block);
        &self.blocks[index]
    }

    /// Recompute the digest linkage of one block and compare with what
    /// is stored. Negative indices count from the end. Fails closed:
    /// anything that cannot be computed is invalid.
    pub fn validate_block(&self, index: i64) -> bool {
        let len = self.blocks.len() as i64;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return false;
        }
        let idx = idx as usize;

        let prev_digest = if idx == 0 {
            NULL_DIGEST
        } else {
            self.blocks[idx - 1].digest.as_str()
        };

        let block = &self.blocks[idx];
        block.digest.starts_with(DIFFICULTY_PREFIX)
            && block.chained_digest(prev_digest) == block.digest
    }

    /// Validate the last `sample` blocks; 0 (or a sample larger than
    /// the chain) means the whole chain. An empty chain never validates.
    pub fn validate_chain(&self, sample: usize) -> bool {
        let len = self.blocks.len();
        if len == 0 {
            return false;
        }
        let count = if sample == 0 || sample > len { len } else { sample };
        (len - count..len).all(|i| self.validate_block(i as i64))
    }

    /// Load-time sampling policy: every 25th load audits the whole
    /// chain, every 5th the last five blocks, otherwise just the tail.
    /// A corrupted interior block invalidates every descendant, so the
    /// tail window is enough to catch it within a bounded number of
    /// loads.
    pub fn audit_sample(&self) -> usize {
        let len = self.blocks.len();
        if len % 25 == 0 {
            0
        } else if len % 5 == 0 {
            5
        } else {
            1
        }
    }

    /// Structural (non-digest) invariants: exactly one genesis block,
    /// at index 0, and every block carries the right param count.
    pub fn check_shape(&self) -> Result<(), ChainError> {
        for (i, block) in self.blocks.iter().enumerate() {
            if (block.kind == BlockKind::Genesis) != (i == 0) {
                return Err(ChainError::Integrity(format!(
                    "{} block at index {}",
                    block.kind, i
                )));
            }
            if block.params.len() != block.kind.param_count() {
                return Err(ChainError::Integrity(format!(
                    "{} block at index {} has {} params",
                    block.kind,
                    i,
                    block.params.len()
                )));
            }
        }
        Ok(())
    }
}
