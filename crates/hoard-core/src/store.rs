//! Persistence boundary
//!
//! The unsealed chain is a newline-terminated sequence of encoded
//! block lines (see [`crate::block`]); that exact layout is what gpg
//! sees, so it stays auditable across implementations. Nothing is
//! written to disk until a block has been successfully appended in
//! memory; the single `fs::write` in [`commit`] is the commit point
//! callers guard against interruption.

use std::fs;
use std::path::Path;

use crate::chain::Chain;
use crate::error::ChainError;
use crate::seal::Sealer;
use crate::Block;

/// Load and validate a sealed chain. An absent file is an empty chain
/// (first use); everything else must unseal, decode, and pass the
/// sampled integrity audit or the invocation dies here.
pub fn load(path: &Path, sealer: &dyn Sealer) -> Result<Chain, ChainError> {
    if !path.exists() {
        return Ok(Chain::new());
    }

    let sealed = fs::read(path)?;
    let plaintext = sealer.unseal(&sealed)?;
    let text = String::from_utf8(plaintext)
        .map_err(|_| ChainError::Integrity("chain plaintext is not valid UTF-8".to_string()))?;

    let chain = decode(&text)?;
    chain.check_shape()?;

    let sample = chain.audit_sample();
    if !chain.validate_chain(sample) {
        let scope = if sample == 0 {
            "full chain".to_string()
        } else {
            format!("last {} block(s)", sample)
        };
        return Err(ChainError::Integrity(format!(
            "digest validation failed ({})",
            scope
        )));
    }

    Ok(chain)
}

/// Seal and write the chain in one step, using the identities recorded
/// in its genesis block.
pub fn commit(chain: &Chain, path: &Path, sealer: &dyn Sealer) -> Result<(), ChainError> {
    let (sign_id, encrypt_id) = chain
        .genesis_keys()
        .ok_or(ChainError::Contract("commit of a chain without a genesis block"))?;

    let sealed = sealer.seal(encode(chain).as_bytes(), sign_id, encrypt_id)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // The commit point: one write, after which the action is durable.
    fs::write(path, sealed)?;
    Ok(())
}

/// Serialize to the persisted plaintext layout.
pub fn encode(chain: &Chain) -> String {
    let mut out = String::new();
    for block in chain.blocks() {
        out.push_str(&block.encode());
        out.push('\n');
    }
    out
}

/// Parse the persisted plaintext layout.
pub fn decode(text: &str) -> Result<Chain, ChainError> {
    let blocks = text
        .lines()
        .map(Block::decode)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Chain::from_blocks(blocks))
}
