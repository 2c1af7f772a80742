//! Skip policy for binary modules: name whitelist, content-hash whitelist and
//! the run-scoped "already processed" set.

use memmap2::Mmap;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, ScanError};

/// Hex digests of one module, taken in a single pass over its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDigests {
    /// Cache key and run-scoped dedup key.
    pub sha256: String,
    /// Identity stored in the digest whitelist (`dll_sha1_whitelist`).
    pub sha1: String,
}

pub fn hash_file(path: &Path) -> Result<ModuleDigests> {
    let map_err = |source| ScanError::Hash {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(map_err)?;
    let len = file.metadata().map_err(map_err)?.len();
    let mut sha256 = Sha256::new();
    let mut sha1 = Sha1::new();
    if len > 0 {
        // SAFETY: The file is opened read-only and outlives the mapping.
        let mmap = unsafe { Mmap::map(&file) }.map_err(map_err)?;
        sha256.update(&mmap[..]);
        sha1.update(&mmap[..]);
    }
    Ok(ModuleDigests {
        sha256: hex::encode(sha256.finalize()),
        sha1: hex::encode(sha1.finalize()),
    })
}

#[derive(Debug, Default)]
pub struct Deduplicator {
    names: HashSet<String>,
    digests: HashSet<String>,
    processed: Mutex<HashSet<String>>,
}

impl Deduplicator {
    /// `names` and `digests` are expected lower-cased, as `ScanRequest` stores them.
    pub fn new(names: HashSet<String>, digests: HashSet<String>) -> Self {
        Self {
            names,
            digests,
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Whitelist check on the file name only.
    pub fn should_skip(&self, module_path: &Path) -> bool {
        module_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.names.contains(&n.to_lowercase()))
    }

    /// Whitelisted digests are SHA-1 hex, the form the settings file stores.
    pub fn is_hash_whitelisted(&self, digests: &ModuleDigests) -> bool {
        self.digests.contains(&digests.sha1.to_ascii_lowercase())
    }

    /// Returns false when `hash` was already marked during this run.
    pub fn mark_processed(&self, hash: &str) -> bool {
        let mut set = self
            .processed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        set.insert(hash.to_string())
    }

    pub fn processed_count(&self) -> usize {
        self.processed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn clear(&self) {
        self.processed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
