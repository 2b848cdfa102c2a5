//! State resolution - backward scan with tombstones
//!
//! The current value of a secret is whatever the most recent `keep`
//! block says, unless a later `forget` tombstoned it. Walking the
//! chain backward and keeping only the first sighting of each id is
//! equivalent to a forward replay, and lets a single-id lookup stop
//! as soon as the id is seen.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::block::BlockKind;
use crate::chain::Chain;

/// Resolved state of one live secret. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretRecord {
    /// Opaque encoded payload exactly as the keep block recorded it.
    pub value: String,
    /// Timestamp of the keep block that set the current value.
    pub timestamp: i64,
}

impl Chain {
    /// Resolve a single secret id. `None` means the id has no live
    /// record: never kept, or tombstoned by a forget.
    pub fn resolve(&self, id: &str) -> Option<SecretRecord> {
        for block in self.blocks().iter().rev() {
            if block.secret_id() != Some(id) {
                continue;
            }
            match block.kind {
                BlockKind::Keep => {
                    return Some(SecretRecord {
                        value: block.params[1].clone(),
                        timestamp: block.timestamp,
                    });
                }
                BlockKind::Forget => return None,
                _ => {}
            }
        }
        None
    }

    /// Resolve every live secret id, sorted by id.
    pub fn resolve_all(&self) -> BTreeMap<String, SecretRecord> {
        let mut seen: BTreeMap<String, Option<SecretRecord>> = BTreeMap::new();

        for block in self.blocks().iter().rev() {
            let id = match block.secret_id() {
                Some(id) => id,
                None => continue,
            };
            let sighting = match block.kind {
                BlockKind::Keep => Some(SecretRecord {
                    value: block.params[1].clone(),
                    timestamp: block.timestamp,
                }),
                BlockKind::Forget => None, // tombstone
                _ => continue,
            };
            // First sighting in the backward walk wins.
            seen.entry(id.to_string()).or_insert(sighting);
        }

        seen.into_iter()
            .filter_map(|(id, record)| record.map(|r| (id, r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StaticKeys;

    fn keys() -> StaticKeys {
        StaticKeys {
            signing: "K1".to_string(),
            encryption: "K1".to_string(),
        }
    }

    fn append(chain: &mut Chain, kind: BlockKind, params: &[&str]) {
        chain
            .append(
                kind,
                params.iter().map(|s| s.to_string()).collect(),
                "tester",
                &keys(),
            )
            .unwrap();
    }

    #[test]
    fn test_latest_keep_wins() {
        let mut chain = Chain::new();
        append(&mut chain, BlockKind::Keep, &["x", "A"]);
        append(&mut chain, BlockKind::Keep, &["x", "B"]);

        let record = chain.resolve("x").unwrap();
        assert_eq!(record.value, "B");
        assert_eq!(record.timestamp, chain.blocks()[2].timestamp);
    }

    #[test]
    fn test_forget_tombstones() {
        let mut chain = Chain::new();
        append(&mut chain, BlockKind::Keep, &["x", "A"]);
        append(&mut chain, BlockKind::Forget, &["x"]);

        assert_eq!(chain.resolve("x"), None);
    }

    #[test]
    fn test_keep_after_forget_revives() {
        let mut chain = Chain::new();
        append(&mut chain, BlockKind::Keep, &["x", "A"]);
        append(&mut chain, BlockKind::Forget, &["x"]);
        append(&mut chain, BlockKind::Keep, &["x", "C"]);

        assert_eq!(chain.resolve("x").unwrap().value, "C");
    }

    #[test]
    fn test_unknown_id_not_found() {
        let mut chain = Chain::new();
        append(&mut chain, BlockKind::Keep, &["x", "A"]);

        assert_eq!(chain.resolve("y"), None);
        // Forget-only history is also not found.
        append(&mut chain, BlockKind::Forget, &["z"]);
        assert_eq!(chain.resolve("z"), None);
    }

    #[test]
    fn test_tell_blocks_do_not_affect_resolution() {
        let mut chain = Chain::new();
        append(&mut chain, BlockKind::Keep, &["x", "A"]);
        append(&mut chain, BlockKind::Tell, &["x"]);
        append(&mut chain, BlockKind::Tell, &["x"]);

        assert_eq!(chain.resolve("x").unwrap().value, "A");
    }

    #[test]
    fn test_resolve_all_scenario() {
        // genesis, keep db, keep api, forget db -> only api survives.
        let mut chain = Chain::new();
        append(&mut chain, BlockKind::Keep, &["db", "p@ss"]);
        append(&mut chain, BlockKind::Keep, &["api", "xyz"]);
        append(&mut chain, BlockKind::Forget, &["db"]);

        let live = chain.resolve_all();
        assert_eq!(live.len(), 1);
        assert_eq!(live["api"].value, "xyz");
        assert_eq!(live["api"].timestamp, chain.blocks()[2].timestamp);
    }

    #[test]
    fn test_resolve_all_empty_chain() {
        assert!(Chain::new().resolve_all().is_empty());
    }
}
