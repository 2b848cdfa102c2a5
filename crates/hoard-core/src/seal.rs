//! Sealing boundary - sign + encrypt via an external service
//!
//! The chain is persisted as a GPG-signed, GPG-encrypted file. This
//! crate never performs cryptography itself; it shells out to the gpg
//! binary and classifies its stderr into a structured error so the CLI
//! can say which check failed. Sealing failures are fatal and never
//! retried.

use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Why the sealing service refused. Every variant is fatal.
#[derive(Error, Debug)]
pub enum SealError {
    #[error("gpg binary not found on PATH")]
    MissingBinary,

    #[error("invalid or unknown recipient: {0}")]
    InvalidRecipient(String),

    #[error("bad or missing passphrase")]
    BadPassphrase,

    #[error("signing or encryption key unusable (revoked, expired, or absent): {0}")]
    UnusableKey(String),

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("sealed file carries no signature")]
    MissingSignature,

    #[error("malformed or unreadable ciphertext: {0}")]
    Malformed(String),

    #[error("sealing service failed: {0}")]
    Other(String),
}

/// External sign+encrypt capability the chain is sealed with.
pub trait Sealer {
    /// Sign with `sign_id`, encrypt to `encrypt_id`.
    fn seal(&self, plaintext: &[u8], sign_id: &str, encrypt_id: &str)
        -> Result<Vec<u8>, SealError>;

    /// Decrypt and verify. Must fail when the signature is absent.
    fn unseal(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SealError>;
}

/// Production sealer: shells out to gpg.
pub struct GpgSealer {
    binary: String,
}

impl Default for GpgSealer {
    fn default() -> Self {
        Self::new()
    }
}

impl GpgSealer {
    pub fn new() -> Self {
        Self {
            binary: "gpg".to_string(),
        }
    }

    fn run(&self, args: &[&str], input: &[u8]) -> Result<(Vec<u8>, String), SealError> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SealError::MissingBinary,
                _ => SealError::Other(e.to_string()),
            })?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(input)
                .map_err(|e| SealError::Other(format!("failed to feed gpg: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SealError::Other(e.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(classify(&stderr));
        }
        Ok((output.stdout, stderr))
    }
}

impl Sealer for GpgSealer {
    fn seal(
        &self,
        plaintext: &[u8],
        sign_id: &str,
        encrypt_id: &str,
    ) -> Result<Vec<u8>, SealError> {
        let (ciphertext, _) = self.run(
            &[
                "--batch",
                "--yes",
                "--quiet",
                "--sign",
                "--encrypt",
                "--local-user",
                sign_id,
                "--recipient",
                encrypt_id,
                "--output",
                "-",
            ],
            plaintext,
        )?;
        Ok(ciphertext)
    }

    fn unseal(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SealError> {
        if ciphertext.is_empty() {
            return Err(SealError::Malformed("sealed file is empty".to_string()));
        }
        let (plaintext, stderr) = self.run(&["--batch", "--decrypt"], ciphertext)?;

        // gpg exits 0 on an unsigned message; an unsealed chain without
        // a signature is still a verification failure for us.
        if !stderr.contains("Signature made") {
            return Err(SealError::MissingSignature);
        }
        Ok(plaintext)
    }
}

/// Map gpg stderr onto the failure taxonomy.
fn classify(stderr: &str) -> SealError {
    let lower = stderr.to_lowercase();

    if lower.contains("bad passphrase") || lower.contains("no passphrase") {
        SealError::BadPassphrase
    } else if lower.contains("bad signature") {
        SealError::BadSignature(first_line(stderr))
    } else if lower.contains("no such user")
        || lower.contains("not a valid user")
        || lower.contains("no public key")
        || lower.contains("no default recipient")
    {
        SealError::InvalidRecipient(first_line(stderr))
    } else if lower.contains("revoked")
        || lower.contains("expired")
        || lower.contains("unusable public key")
        || lower.contains("unusable secret key")
        || lower.contains("no secret key")
    {
        SealError::UnusableKey(first_line(stderr))
    } else if lower.contains("no valid openpgp data")
        || lower.contains("invalid packet")
        || lower.contains("crc error")
        || lower.contains("decryption failed")
    {
        SealError::Malformed(first_line(stderr))
    } else {
        SealError::Other(first_line(stderr))
    }
}

fn first_line(stderr: &str) -> String {
    stderr
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown gpg failure")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_bad_passphrase() {
        assert!(matches!(
            classify("gpg: public key decryption failed: Bad passphrase\n"),
            SealError::BadPassphrase
        ));
    }

    #[test]
    fn test_classify_invalid_recipient() {
        assert!(matches!(
            classify("gpg: nobody@example.com: skipped: No public key\n"),
            SealError::InvalidRecipient(_)
        ));
    }

    #[test]
    fn test_classify_revoked_key() {
        assert!(matches!(
            classify("gpg: 0xDEADBEEF: skipped: Unusable public key\ngpg: note: key has been revoked\n"),
            SealError::UnusableKey(_)
        ));
    }

    #[test]
    fn test_classify_bad_signature() {
        assert!(matches!(
            classify("gpg: BAD signature from \"Alice <alice@example.com>\"\n"),
            SealError::BadSignature(_)
        ));
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(
            classify("gpg: no valid OpenPGP data found.\n"),
            SealError::Malformed(_)
        ));
    }

    #[test]
    fn test_classify_unknown_falls_through() {
        assert!(matches!(
            classify("gpg: something nobody anticipated\n"),
            SealError::Other(_)
        ));
    }

    #[test]
    fn test_unseal_rejects_empty_input() {
        let err = GpgSealer::new().unseal(b"").unwrap_err();
        assert!(matches!(err, SealError::Malformed(_)));
    }
}
