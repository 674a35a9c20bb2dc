//! Tipsets as the host node reports them.

use {
    crate::serde_helpers::base64_bytes,
    base64::{prelude::BASE64_STANDARD, Engine},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Chain height.
pub type ChainEpoch = i64;

/// Opaque tipset identifier: the concatenated block CIDs of the tipset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TipSetKey(#[serde(with = "base64_bytes")] Vec<u8>);

impl TipSetKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for TipSetKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for TipSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64_STANDARD.encode(&self.0))
    }
}

/// A set of blocks at the same height, identified by its [`TipSetKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TipSet {
    pub key: TipSetKey,
    pub epoch: ChainEpoch,
    /// Drand beacon entry of the tipset, used as randomness by the engine.
    #[serde(with = "base64_bytes")]
    pub beacon: Vec<u8>,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}
