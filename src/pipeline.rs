//! The scan-and-decompile pipeline.
//!
//! One coordinating thread collects candidates, scans text files in order and
//! drives a fixed-size worker pool for binary modules. Workers never touch the
//! observer: each one sends a [`ModuleOutcome`] back over a channel and the
//! coordinator turns it into events, so the processed counter and the
//! progress percentage have a single writer.
//!
//! A run moves through `Collecting -> Counting -> ScanningText ->
//! ScanningBinary -> Completed`, and can stop as `Cancelled` (cooperative,
//! partial results kept) or `Failed` (internal fault, partial results kept).

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;

use crate::cache::DecompileCache;
use crate::dedup::{Deduplicator, hash_file};
use crate::decompiler::ModuleDecompiler;
use crate::error::{Result, ScanError};
use crate::matcher::match_content;
use crate::model::{FileKind, FileRecord, MatchResult, ScanRequest};
use crate::progress::{CancelToken, ProgressSink, ScanEvent};
use crate::scan::{collect_candidates, list_tree};
use crate::util::display_path;

/// Half the logical CPUs, never less than one.
pub fn default_worker_count() -> usize {
    (num_cpus::get() / 2).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Collecting,
    Counting,
    ScanningText,
    ScanningBinary,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub phase: ScanPhase,
    pub total_files: usize,
    pub processed: usize,
    pub total_occurrences: usize,
    pub results: Vec<MatchResult>,
}

pub struct ScanPipeline {
    cache: DecompileCache,
    decompiler: Arc<dyn ModuleDecompiler>,
    workers: usize,
}

impl ScanPipeline {
    pub fn new(cache: DecompileCache, decompiler: Arc<dyn ModuleDecompiler>) -> Self {
        Self {
            cache,
            decompiler,
            workers: default_worker_count(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs one scan. `ScanFinished` is always the last event emitted, exactly
    /// once, whatever the outcome.
    pub fn run(
        &self,
        request: &ScanRequest,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> ScanReport {
        let mut state = RunState::new(sink);

        if request.is_noop() {
            state.status("Nothing to scan: no directories, search terms or file kinds selected");
            return state.finish(ScanPhase::Completed);
        }

        match self.execute(request, cancel, &mut state) {
            Ok(phase) => state.finish(phase),
            Err(err) => {
                log::error!("scan aborted during {:?}: {err}", state.phase);
                state.status(format!("Scan failed: {err}"));
                state.finish(ScanPhase::Failed)
            }
        }
    }

    fn execute(
        &self,
        request: &ScanRequest,
        cancel: &CancelToken,
        state: &mut RunState<'_>,
    ) -> Result<ScanPhase> {
        state.enter(ScanPhase::Collecting);
        let Some(files) = collect(request, cancel, state) else {
            return Ok(ScanPhase::Cancelled);
        };

        state.enter(ScanPhase::Counting);
        let (text, binary): (Vec<FileRecord>, Vec<FileRecord>) =
            files.into_iter().partition(|f| f.kind == FileKind::Text);
        state.total = text.len() + binary.len();
        state.sink.emit(ScanEvent::TotalsDiscovered {
            text: text.len(),
            binary: binary.len(),
        });
        if state.total == 0 {
            state.status("No matching files found in any directory");
            return Ok(ScanPhase::Completed);
        }
        state.status(format!(
            "Found {} files total ({} text, {} modules). Starting scan...",
            state.total,
            text.len(),
            binary.len()
        ));

        state.enter(ScanPhase::ScanningText);
        if !scan_text(&text, request.terms(), cancel, state) {
            return Ok(ScanPhase::Cancelled);
        }

        if !binary.is_empty() {
            state.enter(ScanPhase::ScanningBinary);
            if !self.scan_binary(binary, request, cancel, state)? {
                return Ok(ScanPhase::Cancelled);
            }
        }

        Ok(ScanPhase::Completed)
    }

    /// Returns false when the run was cancelled before every module finished.
    fn scan_binary(
        &self,
        modules: Vec<FileRecord>,
        request: &ScanRequest,
        cancel: &CancelToken,
        state: &mut RunState<'_>,
    ) -> Result<bool> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("decomp-worker-{i}"))
            .build()?;
        let ctx = Arc::new(WorkerContext {
            cache: self.cache.clone(),
            decompiler: Arc::clone(&self.decompiler),
            dedup: Deduplicator::new(
                request.whitelist().clone(),
                request.hash_whitelist().clone(),
            ),
            terms: request.terms().to_vec(),
            cancel: cancel.clone(),
        });

        state.status(format!(
            "Scanning {} modules with {} worker(s)",
            modules.len(),
            self.workers
        ));

        let (tx, rx) = mpsc::channel::<ModuleOutcome>();
        let mut queue = modules.into_iter().peekable();
        let mut in_flight = 0usize;
        let mut interrupted = false;

        loop {
            while in_flight < self.workers && queue.peek().is_some() {
                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }
                let Some(record) = queue.next() else { break };
                if ctx.dedup.should_skip(&record.path) {
                    state.status(format!(
                        "Skipping whitelisted module: {}",
                        display_path(&record.path)
                    ));
                    state.advance();
                    continue;
                }

                in_flight += 1;
                let ctx = Arc::clone(&ctx);
                let tx = tx.clone();
                pool.spawn(move || {
                    let outcome = ctx.process(record.path);
                    let _ = tx.send(outcome);
                });
            }

            if in_flight == 0 {
                break;
            }
            let Ok(outcome) = rx.recv() else { break };
            in_flight -= 1;
            if matches!(outcome, ModuleOutcome::Cancelled { .. }) {
                interrupted = true;
            }
            state.apply(outcome);
        }

        Ok(!interrupted)
    }
}

fn collect(
    request: &ScanRequest,
    cancel: &CancelToken,
    state: &mut RunState<'_>,
) -> Option<Vec<FileRecord>> {
    let mut wanted = Vec::with_capacity(2);
    if request.include_text() {
        wanted.push(FileKind::Text);
    }
    if request.include_binary() {
        wanted.push(FileKind::Binary);
    }

    state.status("Collecting files...");
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut files = Vec::new();
    for root in request.roots() {
        if cancel.is_cancelled() {
            return None;
        }
        if !root.is_dir() {
            let err = ScanError::DirectoryNotFound(root.clone());
            log::warn!("{err}");
            state.status(format!("Warning: {err}"));
            continue;
        }

        state.status(format!("Scanning directory: {}", root.display()));
        let collection = collect_candidates(root, &wanted);
        for message in collection.errors {
            let err = ScanError::Collect {
                root: root.clone(),
                message,
            };
            log::warn!("{err}");
            state.status(format!("Warning: {err}"));
        }

        let before = files.len();
        files.extend(
            collection
                .files
                .into_iter()
                .filter(|f| seen.insert(f.path.clone())),
        );
        state.status(format!(
            "Found {} files in {}",
            files.len() - before,
            root.display()
        ));
    }
    Some(files)
}

/// Returns false when cancelled.
fn scan_text(
    files: &[FileRecord],
    terms: &[String],
    cancel: &CancelToken,
    state: &mut RunState<'_>,
) -> bool {
    for record in files {
        if cancel.is_cancelled() {
            return false;
        }
        state.status(format!("Scanning: {}", display_path(&record.path)));

        match std::fs::read(&record.path) {
            Ok(content) => {
                let found = match_content(&content, terms);
                if found.is_hit() {
                    state.record(MatchResult {
                        source_path: record.path.clone(),
                        kind: FileKind::Text,
                        decompiled_path: None,
                        occurrences: found.count,
                        matched_terms: found.matched_terms,
                        snippet: found.snippet,
                    });
                }
            }
            Err(source) => {
                let err = ScanError::FileRead {
                    path: record.path.clone(),
                    source,
                };
                log::warn!("{err}");
                state.status(err.to_string());
            }
        }
        state.advance();
    }
    true
}

struct WorkerContext {
    cache: DecompileCache,
    decompiler: Arc<dyn ModuleDecompiler>,
    dedup: Deduplicator,
    terms: Vec<String>,
    cancel: CancelToken,
}

#[derive(Debug)]
enum ModuleOutcome {
    Scanned {
        module: PathBuf,
        cache_hit: bool,
        files_scanned: usize,
        matches: Vec<MatchResult>,
        errors: Vec<ScanError>,
    },
    Duplicate {
        module: PathBuf,
    },
    HashWhitelisted {
        module: PathBuf,
        hash: String,
    },
    Cancelled {
        module: PathBuf,
    },
    Failed {
        module: PathBuf,
        error: ScanError,
    },
}

impl WorkerContext {
    /// hash -> dedup -> cache lookup -> decompile on miss -> scan the tree,
    /// checking for cancellation between stages.
    fn process(&self, module: PathBuf) -> ModuleOutcome {
        if self.cancel.is_cancelled() {
            return ModuleOutcome::Cancelled { module };
        }

        let digests = match hash_file(&module) {
            Ok(digests) => digests,
            Err(error) => return ModuleOutcome::Failed { module, error },
        };
        if self.dedup.is_hash_whitelisted(&digests) {
            return ModuleOutcome::HashWhitelisted {
                module,
                hash: digests.sha1,
            };
        }
        let hash = digests.sha256;
        if !self.dedup.mark_processed(&hash) {
            return ModuleOutcome::Duplicate { module };
        }

        let (dir, cache_hit) = match self.cache.get(&hash) {
            Some(dir) => (dir, true),
            None => {
                if self.cancel.is_cancelled() {
                    return ModuleOutcome::Cancelled { module };
                }
                log::debug!("decompiling {} ({hash})", module.display());
                let produced = self.cache.put(&hash, |out| {
                    self.decompiler
                        .decompile(&module, out)
                        .map_err(ScanError::from)
                });
                match produced {
                    Ok(dir) => (dir, false),
                    Err(error) => return ModuleOutcome::Failed { module, error },
                }
            }
        };

        if self.cancel.is_cancelled() {
            return ModuleOutcome::Cancelled { module };
        }
        self.scan_tree(module, &dir, cache_hit)
    }

    fn scan_tree(&self, module: PathBuf, dir: &Path, cache_hit: bool) -> ModuleOutcome {
        let files = list_tree(dir);
        let mut matches = Vec::new();
        let mut errors = Vec::new();
        for file in &files {
            match std::fs::read(file) {
                Ok(content) => {
                    let found = match_content(&content, &self.terms);
                    if found.is_hit() {
                        matches.push(MatchResult {
                            source_path: module.clone(),
                            kind: FileKind::Binary,
                            decompiled_path: Some(file.clone()),
                            occurrences: found.count,
                            matched_terms: found.matched_terms,
                            snippet: found.snippet,
                        });
                    }
                }
                Err(source) => errors.push(ScanError::FileRead {
                    path: file.clone(),
                    source,
                }),
            }
        }

        ModuleOutcome::Scanned {
            module,
            cache_hit,
            files_scanned: files.len(),
            matches,
            errors,
        }
    }
}

/// Mutable bookkeeping of one run, owned by the coordinating thread.
struct RunState<'s> {
    phase: ScanPhase,
    total: usize,
    processed: usize,
    last_percent: Option<u8>,
    results: Vec<MatchResult>,
    sink: &'s mut dyn ProgressSink,
}

impl<'s> RunState<'s> {
    fn new(sink: &'s mut dyn ProgressSink) -> Self {
        Self {
            phase: ScanPhase::Collecting,
            total: 0,
            processed: 0,
            last_percent: None,
            results: Vec::new(),
            sink,
        }
    }

    fn enter(&mut self, phase: ScanPhase) {
        log::debug!("phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn status(&mut self, msg: impl Into<String>) {
        self.sink.emit(ScanEvent::StatusMessage(msg.into()));
    }

    fn advance(&mut self) {
        self.processed = (self.processed + 1).min(self.total);
        if self.total == 0 {
            return;
        }
        let percent = (self.processed * 100 / self.total) as u8;
        if self.last_percent.is_none_or(|last| percent > last) {
            self.last_percent = Some(percent);
            self.sink.emit(ScanEvent::ProgressPercent(percent));
        }
    }

    fn record(&mut self, result: MatchResult) {
        self.sink.emit(ScanEvent::FileMatched {
            evidence_path: result.evidence_path().to_path_buf(),
            occurrences: result.occurrences,
            matched_terms: result.matched_terms.clone(),
        });
        self.results.push(result);
    }

    fn apply(&mut self, outcome: ModuleOutcome) {
        match outcome {
            ModuleOutcome::Scanned {
                module,
                cache_hit,
                files_scanned,
                matches,
                errors,
            } => {
                for err in errors {
                    log::warn!("{err}");
                    self.status(err.to_string());
                }
                let occurrences: usize = matches.iter().map(|m| m.occurrences).sum();
                let source = if cache_hit { "cached" } else { "decompiled" };
                log::info!(
                    "{} ({source}): {occurrences} occurrences in {} of {files_scanned} files",
                    module.display(),
                    matches.len()
                );
                self.status(format!(
                    "Module {} ({source}): {occurrences} occurrences in {} files",
                    display_path(&module),
                    matches.len()
                ));
                for m in matches {
                    self.record(m);
                }
                self.advance();
            }
            ModuleOutcome::Duplicate { module } => {
                self.status(format!(
                    "Skipping duplicate module: {} (same content already scanned this run)",
                    display_path(&module)
                ));
                self.advance();
            }
            ModuleOutcome::HashWhitelisted { module, hash } => {
                self.status(format!(
                    "Skipping whitelisted module: {} ({hash})",
                    display_path(&module)
                ));
                self.advance();
            }
            ModuleOutcome::Cancelled { module } => {
                log::debug!("{} not scanned: cancelled", module.display());
            }
            ModuleOutcome::Failed { module, error } => {
                log::warn!("skipping {}: {error}", module.display());
                self.status(format!("Error: {error}"));
                self.advance();
            }
        }
    }

    fn finish(self, phase: ScanPhase) -> ScanReport {
        let total_occurrences: usize = self.results.iter().map(|m| m.occurrences).sum();
        let summary = match phase {
            ScanPhase::Cancelled => format!(
                "Scan cancelled. Kept {} files with matches ({total_occurrences} occurrences).",
                self.results.len()
            ),
            ScanPhase::Failed => format!(
                "Scan stopped early. Kept {} files with matches ({total_occurrences} occurrences).",
                self.results.len()
            ),
            _ if self.results.is_empty() => "Scan completed. No matches found.".to_string(),
            _ => format!(
                "Scan completed. Found {} files with matches ({total_occurrences} occurrences).",
                self.results.len()
            ),
        };
        log::info!("{summary}");
        self.sink.emit(ScanEvent::StatusMessage(summary));
        self.sink.emit(ScanEvent::ScanFinished(self.results.clone()));

        ScanReport {
            phase,
            total_files: self.total,
            processed: self.processed,
            total_occurrences,
            results: self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompiler::DecompileError;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes canned C# output for every module and counts invocations.
    struct FakeDecompiler {
        calls: AtomicUsize,
        body: String,
    }

    impl FakeDecompiler {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                body: body.to_string(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModuleDecompiler for FakeDecompiler {
        fn decompile(&self, module: &Path, out: &Path) -> std::result::Result<(), DecompileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = module
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            fs::create_dir_all(out.join(&stem)).map_err(|source| DecompileError::Io {
                module: module.to_path_buf(),
                source,
            })?;
            fs::write(out.join(&stem).join("Main.cs"), &self.body).map_err(|source| {
                DecompileError::Io {
                    module: module.to_path_buf(),
                    source,
                }
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        cache: DecompileCache,
    }

    fn fixture() -> anyhow::Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("game");
        fs::create_dir_all(&root)?;
        let cache = DecompileCache::open(dir.path().join("cache"))?;
        Ok(Fixture {
            _dir: dir,
            root,
            cache,
        })
    }

    fn run(
        pipeline: &ScanPipeline,
        request: &ScanRequest,
        cancel: &CancelToken,
    ) -> (ScanReport, Vec<ScanEvent>) {
        let mut events = Vec::new();
        let report = {
            let mut sink = |e: ScanEvent| events.push(e);
            pipeline.run(request, &mut sink, cancel)
        };
        (report, events)
    }

    fn percents(events: &[ScanEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::ProgressPercent(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn finished_count(events: &[ScanEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ScanEvent::ScanFinished(_)))
            .count()
    }

    #[test]
    fn text_and_binary_results_with_monotonic_progress() -> anyhow::Result<()> {
        let fx = fixture()?;
        fs::write(fx.root.join("Items.xml"), "<steel/>\n<Steel/>")?;
        fs::write(fx.root.join("Empty.xml"), "<iron/>")?;
        fs::write(fx.root.join("Game.dll"), b"MZ game")?;
        let decompiler = FakeDecompiler::new("class Steel { string s = \"STEEL\"; }\n");
        let pipeline = ScanPipeline::new(fx.cache.clone(), decompiler.clone()).with_workers(2);
        let request = ScanRequest::new([fx.root.clone()], ["Steel"]);

        let (report, events) = run(&pipeline, &request, &CancelToken::new());

        assert_eq!(report.phase, ScanPhase::Completed);
        assert_eq!(report.total_files, 3);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.total_occurrences, 4);
        assert_eq!(report.results[0].kind, FileKind::Text);
        let binary = &report.results[1];
        assert_eq!(binary.kind, FileKind::Binary);
        assert_eq!(binary.source_path, fx.root.join("Game.dll"));
        assert!(binary.evidence_path().ends_with("Game/Main.cs"));
        assert_eq!(binary.snippet.as_deref(), Some("class Steel { string s = \"STEEL\"; }"));
        assert_eq!(decompiler.calls(), 1);

        let p = percents(&events);
        assert!(p.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(p.last(), Some(&100));
        assert_eq!(finished_count(&events), 1);
        assert!(matches!(events.last(), Some(ScanEvent::ScanFinished(r)) if r.len() == 2));
        assert!(events.contains(&ScanEvent::TotalsDiscovered { text: 2, binary: 1 }));
        Ok(())
    }

    #[test]
    fn cache_survives_across_runs() -> anyhow::Result<()> {
        let fx = fixture()?;
        fs::write(fx.root.join("Game.dll"), b"MZ game")?;
        let decompiler = FakeDecompiler::new("steel");
        let pipeline = ScanPipeline::new(fx.cache.clone(), decompiler.clone()).with_workers(1);
        let request = ScanRequest::new([fx.root.clone()], ["steel"]);

        let (first, _) = run(&pipeline, &request, &CancelToken::new());
        let (second, _) = run(&pipeline, &request, &CancelToken::new());

        assert_eq!(first.results, second.results);
        assert_eq!(second.results.len(), 1);
        assert_eq!(decompiler.calls(), 1);
        Ok(())
    }

    #[test]
    fn zero_candidates_short_circuit() -> anyhow::Result<()> {
        let fx = fixture()?;
        fs::write(fx.root.join("notes.txt"), "steel")?;
        let decompiler = FakeDecompiler::new("");
        let pipeline = ScanPipeline::new(fx.cache.clone(), decompiler);
        let request = ScanRequest::new([fx.root.clone()], ["steel"]);

        let (report, events) = run(&pipeline, &request, &CancelToken::new());

        assert_eq!(report.phase, ScanPhase::Completed);
        assert_eq!(report.total_files, 0);
        assert!(report.results.is_empty());
        assert!(percents(&events).is_empty());
        assert!(events.contains(&ScanEvent::TotalsDiscovered { text: 0, binary: 0 }));
        assert_eq!(finished_count(&events), 1);
        Ok(())
    }

    #[test]
    fn noop_request_still_finishes() -> anyhow::Result<()> {
        let fx = fixture()?;
        let pipeline = ScanPipeline::new(fx.cache.clone(), FakeDecompiler::new(""));
        let request = ScanRequest::new([fx.root.clone()], Vec::<String>::new());

        let (report, events) = run(&pipeline, &request, &CancelToken::new());

        assert_eq!(report.phase, ScanPhase::Completed);
        assert_eq!(events.len(), 3);
        assert_eq!(finished_count(&events), 1);
        Ok(())
    }

    #[test]
    fn hash_whitelist_skips_before_decompiling() -> anyhow::Result<()> {
        let fx = fixture()?;
        let module = fx.root.join("Known.dll");
        fs::write(&module, b"MZ known")?;
        let digests = hash_file(&module)?;
        let decompiler = FakeDecompiler::new("steel");
        let pipeline = ScanPipeline::new(fx.cache.clone(), decompiler.clone());
        let request = ScanRequest::new([fx.root.clone()], ["steel"])
            .with_hash_whitelist([digests.sha1.to_uppercase()]);

        let (report, events) = run(&pipeline, &request, &CancelToken::new());

        assert!(report.results.is_empty());
        assert_eq!(decompiler.calls(), 0);
        assert_eq!(percents(&events).last(), Some(&100));
        Ok(())
    }

    #[test]
    fn decompile_failure_is_narrated_and_skipped() -> anyhow::Result<()> {
        struct Failing;
        impl ModuleDecompiler for Failing {
            fn decompile(&self, module: &Path, _: &Path) -> std::result::Result<(), DecompileError> {
                Err(DecompileError::DecompileFailed {
                    module: module.to_path_buf(),
                    code: Some(70),
                    stderr: "bad image".into(),
                })
            }
        }

        let fx = fixture()?;
        fs::write(fx.root.join("Bad.dll"), b"MZ bad")?;
        fs::write(fx.root.join("Ok.xml"), "steel")?;
        let pipeline = ScanPipeline::new(fx.cache.clone(), Arc::new(Failing));
        let request = ScanRequest::new([fx.root.clone()], ["steel"]);

        let (report, events) = run(&pipeline, &request, &CancelToken::new());

        assert_eq!(report.phase, ScanPhase::Completed);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.processed, 2);
        assert!(events.iter().any(|e| matches!(
            e,
            ScanEvent::StatusMessage(m) if m.contains("bad image") && m.contains("Bad.dll")
        )));
        assert!(fx.cache.stats()?.entries == 0);
        Ok(())
    }

    #[test]
    fn unreadable_text_file_does_not_abort() -> anyhow::Result<()> {
        let fx = fixture()?;
        fs::write(fx.root.join("a.xml"), "steel")?;
        let pipeline = ScanPipeline::new(fx.cache.clone(), FakeDecompiler::new(""));
        let request = ScanRequest::new([fx.root.clone()], ["steel"]);
        let cancel = CancelToken::new();

        // Remove the file between collection and reading.
        let mut events = Vec::new();
        let target = fx.root.join("a.xml");
        let report = {
            let mut sink = |e: ScanEvent| {
                if matches!(e, ScanEvent::TotalsDiscovered { .. }) {
                    let _ = fs::remove_file(&target);
                }
                events.push(e);
            };
            pipeline.run(&request, &mut sink, &cancel)
        };

        assert_eq!(report.phase, ScanPhase::Completed);
        assert!(report.results.is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            ScanEvent::StatusMessage(m) if m.starts_with("Error reading")
        )));
        assert_eq!(percents(&events).last(), Some(&100));
        Ok(())
    }

    #[test]
    fn cancel_during_text_phase_keeps_partial_results() -> anyhow::Result<()> {
        let fx = fixture()?;
        fs::write(fx.root.join("a.xml"), "steel")?;
        fs::write(fx.root.join("b.xml"), "steel")?;
        fs::write(fx.root.join("m.dll"), b"MZ")?;
        let decompiler = FakeDecompiler::new("steel");
        let pipeline = ScanPipeline::new(fx.cache.clone(), decompiler.clone());
        let request = ScanRequest::new([fx.root.clone()], ["steel"]);
        let cancel = CancelToken::new();

        let mut events = Vec::new();
        let report = {
            let cancel = cancel.clone();
            let mut sink = |e: ScanEvent| {
                if matches!(e, ScanEvent::FileMatched { .. }) {
                    cancel.cancel();
                }
                events.push(e);
            };
            pipeline.run(&request, &mut sink, &cancel)
        };

        assert_eq!(report.phase, ScanPhase::Cancelled);
        assert_eq!(report.results.len(), 1);
        assert_eq!(decompiler.calls(), 0);
        assert_eq!(finished_count(&events), 1);
        Ok(())
    }
}
