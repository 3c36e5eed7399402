use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// SHA-256 digest of a chunk's text
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(text: &str) -> Self {
        Self(Sha256::digest(text.as_bytes()).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// Run-wide set of emitted chunk hashes
///
/// Shared by every page of the crawl, so a chunk seen on any earlier page is
/// never emitted again.
#[derive(Debug, Default)]
pub struct ContentDeduper {
    seen: Mutex<HashSet<ContentHash>>,
}

impl ContentDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `hash`; returns true if it had not been seen before
    ///
    /// The check and the insert happen under one lock.
    pub fn insert_if_new(&self, hash: ContentHash) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash)
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
