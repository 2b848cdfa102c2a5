//! Block model
//!
//! One block is one immutable action record. Blocks round-trip exactly
//! to the persisted layout: a single tab-separated line in the fixed
//! field order `kind, actor, timestamp, params..., nonce, digest`.
//! The number of params is determined by the kind.

use serde::{Deserialize, Serialize};

use crate::digest::digest;
use crate::error::ChainError;

/// The action a block records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// First block of a chain; params are the signing and encryption
    /// key identities used to seal the persisted file.
    Genesis,
    /// Store a secret; params are [secret id, opaque encoded payload].
    Keep,
    /// Read a secret; params are [secret id].
    Tell,
    /// Tombstone a secret; params are [secret id].
    Forget,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Genesis => "genesis",
            BlockKind::Keep => "keep",
            BlockKind::Tell => "tell",
            BlockKind::Forget => "forget",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "genesis" => Some(BlockKind::Genesis),
            "keep" => Some(BlockKind::Keep),
            "tell" => Some(BlockKind::Tell),
            "forget" => Some(BlockKind::Forget),
            _ => None,
        }
    }

    /// Exact number of parameter fields a block of this kind carries.
    pub fn param_count(&self) -> usize {
        match self {
            BlockKind::Genesis | BlockKind::Keep => 2,
            BlockKind::Tell | BlockKind::Forget => 1,
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hash-linked record of a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Identity of the invoking principal (local username).
    pub actor: String,
    /// Seconds since epoch. Informational only; ordering is by index.
    pub timestamp: i64,
    /// Meaning depends on `kind`, see [`BlockKind`].
    pub params: Vec<String>,
    /// Fixed-width random hex drawn during mining.
    pub nonce: String,
    /// Chained digest; must begin with the difficulty prefix.
    pub digest: String,
}

impl Block {
    /// Secret id this block refers to, if any.
    pub fn secret_id(&self) -> Option<&str> {
        match self.kind {
            BlockKind::Genesis => None,
            _ => self.params.first().map(String::as_str),
        }
    }

    /// Canonical content fields (everything except nonce and digest),
    /// tab-joined. Captured once at mining time; retries never change it.
    pub(crate) fn content_line(&self) -> String {
        let mut fields = vec![self.kind.as_str().to_string(), self.actor.clone(), self.timestamp.to_string()];
        fields.extend(self.params.iter().cloned());
        fields.join("\t")
    }

    /// Digest of content + nonce (the inner hash of the chain formula).
    pub(crate) fn inner_digest(&self) -> String {
        digest(format!("{}\t{}", self.content_line(), self.nonce).as_bytes())
    }

    /// The chain linkage formula: `H(prev_digest || H(content || nonce))`.
    pub(crate) fn chained_digest(&self, prev_digest: &str) -> String {
        digest(format!("{}{}", prev_digest, self.inner_digest()).as_bytes())
    }

    /// Encode to the persisted line (no trailing newline).
    pub fn encode(&self) -> String {
        format!("{}\t{}\t{}", self.content_line(), self.nonce, self.digest)
    }

    /// Decode one persisted line. Field count is validated against the
    /// kind; any disagreement is an integrity failure.
    pub fn decode(line: &str) -> Result<Self, ChainError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return Err(ChainError::Integrity(format!(
                "block line has {} fields, expected at least 5",
                fields.len()
            )));
        }

        let kind = BlockKind::parse(fields[0])
            .ok_or_else(|| ChainError::Integrity(format!("unknown block kind: {}", fields[0])))?;

        let expected = 3 + kind.param_count() + 2;
        if fields.len() != expected {
            return Err(ChainError::Integrity(format!(
                "{} block has {} fields, expected {}",
                kind,
                fields.len(),
                expected
            )));
        }

        let timestamp: i64 = fields[2]
            .parse()
            .map_err(|_| ChainError::Integrity(format!("bad timestamp: {}", fields[2])))?;

        let params = fields[3..fields.len() - 2]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Ok(Block {
            kind,
            actor: fields[1].to_string(),
            timestamp,
            params,
            nonce: fields[fields.len() - 2].to_string(),
            digest: fields[fields.len() - 1].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: BlockKind, params: &[&str]) -> Block {
        Block {
            kind,
            actor: "alice".to_string(),
            timestamp: 1_700_000_000,
            params: params.iter().map(|s| s.to_string()).collect(),
            nonce: "deadbeef".to_string(),
            digest: "00ab".to_string(),
        }
    }

    #[test]
    fn test_round_trip_all_kinds() {
        let blocks = [
            sample(BlockKind::Genesis, &["SIGNKEY", "ENCKEY"]),
            sample(BlockKind::Keep, &["db/prod", "70407373"]),
            sample(BlockKind::Tell, &["db/prod"]),
            sample(BlockKind::Forget, &["db/prod"]),
        ];
        for block in blocks {
            let line = block.encode();
            assert_eq!(Block::decode(&line).unwrap(), block);
        }
    }

    #[test]
    fn test_encode_layout() {
        let block = sample(BlockKind::Keep, &["api", "abcd"]);
        assert_eq!(
            block.encode(),
            "keep\talice\t1700000000\tapi\tabcd\tdeadbeef\t00ab"
        );
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let err = Block::decode("share\talice\t1\tx\tn\td").unwrap_err();
        assert!(matches!(err, ChainError::Integrity(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_param_count() {
        // tell takes exactly one param
        assert!(Block::decode("tell\talice\t1\tx\ty\tn\td").is_err());
        // keep takes exactly two
        assert!(Block::decode("keep\talice\t1\tx\tn\td").is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Block::decode("").is_err());
        assert!(Block::decode("not a block at all").is_err());
        assert!(Block::decode("keep\talice\tsoon\tx\ty\tn\td").is_err());
    }

    #[test]
    fn test_content_line_excludes_nonce_and_digest() {
        let block = sample(BlockKind::Forget, &["api"]);
        assert_eq!(block.content_line(), "forget\talice\t1700000000\tapi");
    }

    #[test]
    fn test_secret_id() {
        assert_eq!(sample(BlockKind::Keep, &["api", "v"]).secret_id(), Some("api"));
        assert_eq!(sample(BlockKind::Genesis, &["s", "e"]).secret_id(), None);
    }
}
