//! Block digests.
//!
//! A digest is a fixed-width hash of a block's exact bytes. It travels on the
//! wire and sits in the checksum cache as lowercase hex.

use serde::{Deserialize, Serialize};
use sha1::Digest as _;
use std::fmt;

/// Wire encoding of [`RemoteDigest::Missing`].
pub const SENTINEL: &str = "-1";

/// Hash function used for block digests.
///
/// Both roles must use the same algorithm; the serving role learns it from
/// its invocation parameters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// 160-bit SHA-1, 40 hex characters.
    #[default]
    Sha1,
    /// 256-bit BLAKE3, 64 hex characters.
    Blake3,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Raw digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Blake3 => 32,
        }
    }

    /// Length of the hex encoding, which is also the cache entry width.
    pub fn hex_width(&self) -> usize {
        self.digest_len() * 2
    }

    pub fn digest(&self, data: &[u8]) -> Digest {
        let bytes: Box<[u8]> = match self {
            HashAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec().into_boxed_slice(),
            HashAlgorithm::Blake3 => blake3::hash(data).as_bytes().to_vec().into_boxed_slice(),
        };
        Digest(bytes)
    }

    /// Parse a hex digest produced by this algorithm.
    ///
    /// Returns `None` if the text is not valid hex of exactly the expected width.
    pub fn parse_hex(&self, text: &str) -> Option<Digest> {
        if text.len() != self.hex_width() {
            return None;
        }
        hex::decode(text)
            .ok()
            .map(|bytes| Digest(bytes.into_boxed_slice()))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hash of one block's content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest(Box<[u8]>);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// What the serving role reports for one block index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDigest {
    /// Digest of the destination's block (computed or cached).
    Present(Digest),
    /// The block starts at or beyond the destination's current end.
    Missing,
}

impl RemoteDigest {
    /// Wire/line encoding, without the trailing newline.
    pub fn encode(&self) -> String {
        match self {
            RemoteDigest::Present(digest) => digest.to_hex(),
            RemoteDigest::Missing => SENTINEL.to_string(),
        }
    }

    /// Parse a digest line (already stripped of its newline).
    pub fn decode(line: &str, algorithm: HashAlgorithm) -> Option<Self> {
        let line = line.trim();
        if line == SENTINEL {
            return Some(RemoteDigest::Missing);
        }
        algorithm.parse_hex(line).map(RemoteDigest::Present)
    }

    /// True only for a present digest equal to `local`. The sentinel never matches.
    pub fn matches(&self, local: &Digest) -> bool {
        match self {
            RemoteDigest::Present(remote) => remote == local,
            RemoteDigest::Missing => false,
        }
    }
}
