use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::model::{FileKind, FileRecord};

/// Candidates found under one root, plus any entries the walk could not read.
#[derive(Debug, Default)]
pub struct Collection {
    pub files: Vec<FileRecord>,
    pub errors: Vec<String>,
}

impl Collection {
    pub fn count(&self, kind: FileKind) -> usize {
        self.files.iter().filter(|f| f.kind == kind).count()
    }
}

enum Walked {
    File(FileRecord),
    Error(String),
}

/// Walks `root` recursively and keeps files whose kind is in `wanted`,
/// sorted by path.
pub fn collect_candidates(root: &Path, wanted: &[FileKind]) -> Collection {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_some_and(|t| t.is_file());
                    if is_file
                        && let Some(kind) = FileKind::from_path(entry.path())
                        && wanted.contains(&kind)
                    {
                        let _ = tx.send(Walked::File(FileRecord {
                            path: entry.into_path(),
                            kind,
                        }));
                    }
                }
                Err(err) => {
                    let _ = tx.send(Walked::Error(err.to_string()));
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut collection = Collection::default();
    for walked in rx {
        match walked {
            Walked::File(record) => collection.files.push(record),
            Walked::Error(msg) => collection.errors.push(msg),
        }
    }
    collection.files.sort_by(|a, b| a.path.cmp(&b.path));
    collection
}

/// Every regular file under a decompiled output tree.
pub fn list_tree(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .standard_filters(false)
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
