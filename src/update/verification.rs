use crate::constants::HASH_CHUNK_SIZE;
use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// A fixed-length SHA-256 content digest.
///
/// Parsed from 64 hex characters, case-insensitive, with an optional
/// `sha256:` prefix. Always displayed as lowercase hex without prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest of an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Sha256Digest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let hex_part = trimmed.strip_prefix("sha256:").unwrap_or(trimmed);

        if hex_part.len() != 64 {
            bail!("Expected 64 hex characters for a SHA-256 digest, got {}", hex_part.len());
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut bytes)
            .with_context(|| format!("Invalid SHA-256 digest: {trimmed}"))?;
        Ok(Self(bytes))
    }
}

/// Computes and compares content digests of files.
///
/// Stateless: every method is an associated function so the verifier can be
/// used from any component without threading an instance through.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA-256 digest of a file.
    ///
    /// The file is read in bounded chunks so multi-gigabyte AppImages never
    /// have to fit in memory.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or read.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use aiup_cli::update::ChecksumVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let digest = ChecksumVerifier::digest(Path::new("/path/to/binary")).await?;
    /// println!("SHA256: {digest}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn digest(file_path: &Path) -> Result<Sha256Digest> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = File::open(file_path)
            .await
            .with_context(|| format!("Failed to open file for hashing: {}", file_path.display()))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(Sha256Digest(hasher.finalize().into()))
    }

    /// Compare two digests.
    ///
    /// Every byte is visited; there is no early exit. This is an integrity
    /// check, not a secret comparison.
    pub fn equal(a: &Sha256Digest, b: &Sha256Digest) -> bool {
        a.0.iter().zip(b.0.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    /// Hash `file_path` and report whether it matches `expected`.
    ///
    /// Returns the computed digest alongside the verdict so callers can
    /// report it.
    pub async fn matches(file_path: &Path, expected: &Sha256Digest) -> Result<(bool, Sha256Digest)> {
        let actual = Self::digest(file_path).await?;
        Ok((Self::equal(&actual, expected), actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_digest_known_value() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Hello, World!").unwrap();

        let digest = ChecksumVerifier::digest(temp_file.path()).await.unwrap();

        assert_eq!(
            digest.to_hex(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[tokio::test]
    async fn test_digest_is_deterministic() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&vec![7u8; HASH_CHUNK_SIZE * 3 + 17]).unwrap();

        let first = ChecksumVerifier::digest(temp_file.path()).await.unwrap();
        let second = ChecksumVerifier::digest(temp_file.path()).await.unwrap();
        assert_eq!(first, second);
        assert!(ChecksumVerifier::equal(&first, &second));
    }

    #[tokio::test]
    async fn test_chunked_digest_matches_in_memory_digest() {
        let data: Vec<u8> = (0..HASH_CHUNK_SIZE * 2 + 5).map(|i| (i % 251) as u8).collect();
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&data).unwrap();

        let from_file = ChecksumVerifier::digest(temp_file.path()).await.unwrap();
        assert_eq!(from_file, Sha256Digest::of_bytes(&data));
    }

    #[tokio::test]
    async fn test_digest_missing_file_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = ChecksumVerifier::digest(&temp.path().join("missing")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_matches_reports_mismatch() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Test content").unwrap();

        let wrong = Sha256Digest::from_bytes([0u8; 32]);
        let (ok, actual) = ChecksumVerifier::matches(temp_file.path(), &wrong).await.unwrap();
        assert!(!ok);
        assert_eq!(actual, Sha256Digest::of_bytes(b"Test content"));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_accepts_prefix() {
        let lower: Sha256Digest =
            "532eaabd9574880dbf76b9b8cc00832c20a6ec113d682299550d7a6e0f345e25".parse().unwrap();
        let upper: Sha256Digest =
            "sha256:532EAABD9574880DBF76B9B8CC00832C20A6EC113D682299550D7A6E0F345E25"
                .parse()
                .unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, Sha256Digest::of_bytes(b"Test"));
    }

    #[test]
    fn test_parse_rejects_wrong_length_and_non_hex() {
        assert!("abc".parse::<Sha256Digest>().is_err());
        assert!("zz".repeat(32).parse::<Sha256Digest>().is_err());
    }

    #[test]
    fn test_equal_detects_single_byte_difference() {
        let a = Sha256Digest::from_bytes([1u8; 32]);
        let mut bytes = [1u8; 32];
        bytes[31] = 2;
        let b = Sha256Digest::from_bytes(bytes);
        assert!(!ChecksumVerifier::equal(&a, &b));
        assert!(ChecksumVerifier::equal(&a, &a));
    }
}
