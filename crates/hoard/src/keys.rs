//! Interactive key selection for the genesis block
//!
//! When the first block is ever mined the chain needs a signing and an
//! encryption identity. We list the user's gpg secret keys and prompt
//! on stderr/stdin (stdout stays clean for piping secret values).

use std::io::{BufRead, Write};
use std::process::Command;

use hoard_core::{ChainError, KeySource};

/// One usable secret key from the local gpg keyring.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub key_id: String,
    pub uid: String,
}

/// Prompts the user to pick genesis identities from their gpg keyring.
pub struct GpgKeyPrompt;

impl KeySource for GpgKeyPrompt {
    fn select(&self) -> Result<(String, String), ChainError> {
        let keys = list_secret_keys()?;
        if keys.is_empty() {
            return Err(ChainError::KeySelection(
                "no gpg secret keys found; create one with 'gpg --gen-key'".to_string(),
            ));
        }

        if keys.len() == 1 {
            eprintln!("Using gpg key {} ({})", keys[0].key_id, keys[0].uid);
            return Ok((keys[0].key_id.clone(), keys[0].key_id.clone()));
        }

        eprintln!("Available gpg secret keys:");
        for (i, key) in keys.iter().enumerate() {
            eprintln!("  [{}] {}  {}", i + 1, key.key_id, key.uid);
        }

        let signing = pick(&keys, "Signing key number: ")?;
        let encryption = pick(&keys, "Encryption key number (enter for same): ")
            .unwrap_or_else(|_| signing.clone());
        Ok((signing, encryption))
    }
}

fn pick(keys: &[KeyEntry], prompt: &str) -> Result<String, ChainError> {
    eprint!("{}", prompt);
    let _ = std::io::stderr().flush();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| ChainError::KeySelection(format!("failed to read selection: {}", e)))?;

    let choice: usize = line
        .trim()
        .parse()
        .map_err(|_| ChainError::KeySelection(format!("not a key number: {}", line.trim())))?;

    keys.get(choice.wrapping_sub(1))
        .map(|k| k.key_id.clone())
        .ok_or_else(|| ChainError::KeySelection(format!("no key numbered {}", choice)))
}

/// List secret keys via gpg's machine-readable colon output.
fn list_secret_keys() -> Result<Vec<KeyEntry>, ChainError> {
    let output = Command::new("gpg")
        .args(["--batch", "--list-secret-keys", "--with-colons"])
        .output()
        .map_err(|e| ChainError::KeySelection(format!("failed to run gpg: {}", e)))?;

    if !output.status.success() {
        return Err(ChainError::KeySelection(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(parse_colon_listing(&String::from_utf8_lossy(&output.stdout)))
}

/// Pull (key id, uid) pairs out of `--with-colons` output. A `sec`
/// record opens a key; the first following `uid` record names it.
fn parse_colon_listing(listing: &str) -> Vec<KeyEntry> {
    let mut keys = Vec::new();
    let mut pending: Option<String> = None;

    for line in listing.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        match fields.first() {
            Some(&"sec") => {
                pending = fields.get(4).map(|id| id.to_string());
            }
            Some(&"uid") => {
                if let (Some(key_id), Some(uid)) = (pending.take(), fields.get(9)) {
                    keys.push(KeyEntry {
                        key_id,
                        uid: uid.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
sec:u:4096:1:AAAABBBBCCCCDDDD:1600000000:::u:::scESC:::+:::23::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
grp:::::::::FEDCBA9876543210FEDCBA9876543210FEDCBA98:
uid:u::::1600000000::HASH1::Alice Example <alice@example.com>::::::::::0:
ssb:u:4096:1:1111222233334444:1600000000::::::e:::+:::23:
sec:u:255:22:EEEEFFFF00001111:1650000000:::u:::scESC:::+::ed25519:::0:
uid:u::::1650000000::HASH2::Backup Key <backup@example.com>::::::::::0:
";

    #[test]
    fn test_parse_colon_listing() {
        let keys = parse_colon_listing(LISTING);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].key_id, "AAAABBBBCCCCDDDD");
        assert_eq!(keys[0].uid, "Alice Example <alice@example.com>");
        assert_eq!(keys[1].key_id, "EEEEFFFF00001111");
    }

    #[test]
    fn test_parse_ignores_subkeys_and_noise() {
        let keys = parse_colon_listing("ssb:u:255:18:9999:1::::::e:\ntru::1:1:3:\n");
        assert!(keys.is_empty());
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_colon_listing("").is_empty());
    }
}
