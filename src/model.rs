//! Request and result types shared by the pipeline and its callers.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parameters of one scan. Built once from external input, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    roots: Vec<PathBuf>,
    terms: Vec<String>,
    include_text: bool,
    include_binary: bool,
    whitelist: HashSet<String>,
    hash_whitelist: HashSet<String>,
}

impl ScanRequest {
    pub fn new<R, T, S>(roots: R, terms: T) -> Self
    where
        R: IntoIterator<Item = PathBuf>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen_roots = HashSet::new();
        let roots = roots
            .into_iter()
            .filter(|r| !r.as_os_str().is_empty())
            .filter(|r| seen_roots.insert(r.clone()))
            .collect();

        let mut terms_out: Vec<String> = Vec::new();
        for term in terms {
            let term = normalize_term(term.as_ref());
            if !term.is_empty() && !terms_out.contains(&term) {
                terms_out.push(term);
            }
        }

        Self {
            roots,
            terms: terms_out,
            include_text: true,
            include_binary: true,
            whitelist: HashSet::new(),
            hash_whitelist: HashSet::new(),
        }
    }

    /// Builds a request from the semicolon-delimited directory and term lists
    /// the UI collects.
    pub fn from_delimited(dirs: &str, terms: &str) -> Self {
        Self::new(
            split_delimited(dirs).map(PathBuf::from),
            split_delimited(terms),
        )
    }

    pub fn with_text(mut self, include: bool) -> Self {
        self.include_text = include;
        self
    }

    pub fn with_binary(mut self, include: bool) -> Self {
        self.include_binary = include;
        self
    }

    /// Module file names to skip entirely, compared case-insensitively.
    pub fn with_whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        self
    }

    /// Hex content digests of modules to skip after hashing.
    pub fn with_hash_whitelist<I, S>(mut self, digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hash_whitelist = digests
            .into_iter()
            .map(|d| d.as_ref().trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn include_text(&self) -> bool {
        self.include_text
    }

    pub fn include_binary(&self) -> bool {
        self.include_binary
    }

    pub fn whitelist(&self) -> &HashSet<String> {
        &self.whitelist
    }

    pub fn hash_whitelist(&self) -> &HashSet<String> {
        &self.hash_whitelist
    }

    /// True when running the request cannot produce any work.
    pub fn is_noop(&self) -> bool {
        self.terms.is_empty()
            || self.roots.is_empty()
            || (!self.include_text && !self.include_binary)
    }
}

pub fn normalize_term(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn split_delimited(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(';').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Binary,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("xml") {
            Some(FileKind::Text)
        } else if ext.eq_ignore_ascii_case("dll") {
            Some(FileKind::Binary)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// One finding. `decompiled_path` is only set for binary modules, where the
/// match lives in a decompiled file rather than the module itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub source_path: PathBuf,
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decompiled_path: Option<PathBuf>,
    pub occurrences: usize,
    pub matched_terms: Vec<String>,
    pub snippet: Option<String>,
}

impl MatchResult {
    pub fn evidence_path(&self) -> &Path {
        self.decompiled_path.as_deref().unwrap_or(&self.source_path)
    }
}
