//! Single-pass multi-digest hashing.
//!
//! Every cataloged file carries one digest per algorithm in a fixed set.
//! The whole set is computed in a single chunked read of the file: each
//! chunk is fed to all hashers before the next read, so a file is never
//! opened or traversed more than once per refresh.

pub mod error;

use blake2::{Blake2b512, Blake2s256};
use digest::{Digest, DynDigest};
use exn::ResultExt;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// The fixed set of digest algorithms recorded for every file.
///
/// The set is part of the storage contract: a file row is only complete
/// once it has a digest for each of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Blake2b,
    Blake2s,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Sha512,
}

/// The algorithm used for equality comparisons (change detection, junk
/// signatures, archive membership). The others exist for integrity
/// auditing and cross-referencing with external databases.
pub const COMPARISON_ALGORITHM: Algorithm = Algorithm::Sha512;

impl Algorithm {
    pub const ALL: [Algorithm; 11] = [
        Algorithm::Blake2b,
        Algorithm::Blake2s,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha3_224,
        Algorithm::Sha3_256,
        Algorithm::Sha3_384,
        Algorithm::Sha3_512,
        Algorithm::Sha512,
    ];

    /// Stable lowercase name, used as the `algorithm` column value.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Blake2b => "blake2b",
            Algorithm::Blake2s => "blake2s",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha3_224 => "sha3_224",
            Algorithm::Sha3_256 => "sha3_256",
            Algorithm::Sha3_384 => "sha3_384",
            Algorithm::Sha3_512 => "sha3_512",
            Algorithm::Sha512 => "sha512",
        }
    }

    fn hasher(&self) -> Box<dyn DynDigest + Send> {
        match self {
            Algorithm::Blake2b => Box::new(Blake2b512::new()),
            Algorithm::Blake2s => Box::new(Blake2s256::new()),
            Algorithm::Sha1 => Box::new(Sha1::new()),
            Algorithm::Sha224 => Box::new(Sha224::new()),
            Algorithm::Sha256 => Box::new(Sha256::new()),
            Algorithm::Sha384 => Box::new(Sha384::new()),
            Algorithm::Sha3_224 => Box::new(Sha3_224::new()),
            Algorithm::Sha3_256 => Box::new(Sha3_256::new()),
            Algorithm::Sha3_384 => Box::new(Sha3_384::new()),
            Algorithm::Sha3_512 => Box::new(Sha3_512::new()),
            Algorithm::Sha512 => Box::new(Sha512::new()),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One hex digest per algorithm, all computed from the same byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSet {
    digests: BTreeMap<Algorithm, String>,
}

impl DigestSet {
    pub fn get(&self, algorithm: Algorithm) -> &str {
        // Construction always fills every algorithm, so the lookup is total.
        &self.digests[&algorithm]
    }

    /// Digest under the comparison algorithm.
    pub fn comparison(&self) -> &str {
        self.get(COMPARISON_ALGORITHM)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Algorithm, &str)> {
        self.digests.iter().map(|(algorithm, digest)| (*algorithm, digest.as_str()))
    }
}

struct Hashers(Vec<(Algorithm, Box<dyn DynDigest + Send>)>);

impl Hashers {
    fn new() -> Self {
        Self(Algorithm::ALL.iter().map(|algorithm| (*algorithm, algorithm.hasher())).collect())
    }

    fn update(&mut self, chunk: &[u8]) {
        for (_, hasher) in &mut self.0 {
            hasher.update(chunk);
        }
    }

    fn finish(self) -> DigestSet {
        let digests = self
            .0
            .into_iter()
            .map(|(algorithm, hasher)| (algorithm, hex::encode(hasher.finalize())))
            .collect();
        DigestSet { digests }
    }
}

/// Hash an in-memory buffer under the full algorithm set.
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> DigestSet {
    let mut hashers = Hashers::new();
    hashers.update(bytes.as_ref());
    hashers.finish()
}

/// Hash a file under the full algorithm set in one streaming pass.
///
/// # Errors
/// Returns [`ErrorKind::Unavailable`] if the file cannot be opened or a
/// read fails partway through; callers never observe a partial set.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub async fn hash_file(path: impl AsRef<Path>) -> Result<DigestSet> {
    let path = path.as_ref();
    let mut file = tokio::fs::File::open(path)
        .await
        .or_raise(|| ErrorKind::Unavailable(path.to_path_buf()))?;
    let mut hashers = Hashers::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await.or_raise(|| ErrorKind::Unavailable(path.to_path_buf()))?;
        if read == 0 {
            break;
        }
        hashers.update(&buffer[..read]);
    }
    Ok(hashers.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Algorithm::Sha256, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    #[case(
        Algorithm::Sha512,
        "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
         2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
    )]
    #[case(Algorithm::Sha1, "a9993e364706816aba3e25717850c26c9cd0d89d")]
    fn test_known_vectors(#[case] algorithm: Algorithm, #[case] expected: &str) {
        let set = hash_bytes(b"abc");
        assert_eq!(set.get(algorithm), expected);
    }

    #[test]
    fn test_every_algorithm_present() {
        let set = hash_bytes(b"");
        for algorithm in Algorithm::ALL {
            assert!(!set.get(algorithm).is_empty());
        }
    }

    #[tokio::test]
    async fn test_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.bin");
        std::fs::write(&path, b"not actually an image").unwrap();
        let from_file = hash_file(&path).await.unwrap();
        assert_eq!(from_file, hash_bytes(b"not actually an image"));
    }

    #[tokio::test]
    async fn test_deterministic_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.bin");
        std::fs::write(&path, vec![0x5Au8; 200_000]).unwrap();
        let first = hash_file(&path).await.unwrap();
        let second = hash_file(&path).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let result = hash_file("/definitely/not/here.jpg").await;
        assert!(result.is_err());
    }
}
