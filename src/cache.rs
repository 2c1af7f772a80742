//! Content-addressed store of decompiled module trees.
//!
//! Layout: `<root>/<hex digest>/...`, one directory per distinct module
//! content. New entries are produced in a staging directory under the same
//! root and renamed into place, so a reader never sees a partial entry.

use ignore::WalkBuilder;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScanError};

const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone)]
pub struct DecompileCache {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub root: String,
    pub entries: u64,
    pub total_bytes: u64,
}

impl DecompileCache {
    /// Creates the root if needed and removes staging directories left by an
    /// interrupted run.
    pub fn open(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|source| cache_error(&root, source))?;
        let cache = Self { root };
        cache.sweep_staging()?;
        Ok(cache)
    }

    fn sweep_staging(&self) -> Result<()> {
        let read =
            std::fs::read_dir(&self.root).map_err(|source| cache_error(&self.root, source))?;
        for entry in read.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            let path = entry.path();
            log::debug!("removing leftover staging directory {}", path.display());
            if let Err(err) = std::fs::remove_dir_all(&path) {
                log::warn!("Failed to remove {}: {err}", path.display());
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    pub fn get(&self, hash: &str) -> Option<PathBuf> {
        let path = self.entry_path(hash);
        path.is_dir().then_some(path)
    }

    /// Returns the entry for `hash`, running `producer` into a fresh staging
    /// directory only on a miss. A failed producer leaves no entry behind.
    pub fn put<F>(&self, hash: &str, producer: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        if let Some(existing) = self.get(hash) {
            return Ok(existing);
        }

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|source| cache_error(&self.root, source))?;

        producer(staging.path())?;

        let target = self.entry_path(hash);
        match std::fs::rename(staging.path(), &target) {
            Ok(()) => {
                // The staging guard now points at a moved path; its cleanup is a no-op.
                drop(staging);
                log::debug!("cached decompilation {hash} at {}", target.display());
                Ok(target)
            }
            Err(_) if target.is_dir() => Ok(target),
            Err(source) => Err(cache_error(&target, source)),
        }
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut entries = 0u64;
        let read =
            std::fs::read_dir(&self.root).map_err(|source| cache_error(&self.root, source))?;
        for entry in read.flatten() {
            let is_entry = entry.file_type().is_ok_and(|t| t.is_dir())
                && !entry.file_name().to_string_lossy().starts_with('.');
            if is_entry {
                entries += 1;
            }
        }

        let total_bytes = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();

        Ok(CacheStats {
            root: self.root.to_string_lossy().to_string(),
            entries,
            total_bytes,
        })
    }

    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)
                .map_err(|source| cache_error(&self.root, source))?;
        }
        std::fs::create_dir_all(&self.root).map_err(|source| cache_error(&self.root, source))
    }
}

fn cache_error(path: &Path, source: io::Error) -> ScanError {
    ScanError::Cache {
        path: path.to_path_buf(),
        source,
    }
}
