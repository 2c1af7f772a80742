//! Events a scan reports to its observer, and the cancellation flag the
//! observer can raise.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use crate::model::MatchResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    StatusMessage(String),
    /// 0..=100, never decreasing within a run.
    ProgressPercent(u8),
    TotalsDiscovered { text: usize, binary: usize },
    FileMatched {
        evidence_path: PathBuf,
        occurrences: usize,
        matched_terms: Vec<String>,
    },
    /// Emitted exactly once per run, last.
    ScanFinished(Vec<MatchResult>),
}

/// Consumer of a run's event stream. Only the coordinating thread emits.
pub trait ProgressSink {
    fn emit(&mut self, event: ScanEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ScanEvent),
{
    fn emit(&mut self, event: ScanEvent) {
        self(event)
    }
}

impl ProgressSink for Sender<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) {
        let _ = self.send(event);
    }
}

/// Narrates events through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink {
    matched_files: usize,
}

impl ProgressSink for LogSink {
    fn emit(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::StatusMessage(msg) => log::info!("{msg}"),
            ScanEvent::ProgressPercent(p) => log::debug!("progress {p}%"),
            ScanEvent::TotalsDiscovered { text, binary } => {
                log::info!("{text} text files and {binary} modules to scan")
            }
            ScanEvent::FileMatched {
                evidence_path,
                occurrences,
                ..
            } => {
                self.matched_files += 1;
                log::info!(
                    "Found match: {} ({occurrences} occurrences)",
                    evidence_path.display()
                );
            }
            ScanEvent::ScanFinished(results) => {
                log::info!(
                    "=== SCAN COMPLETE === {} result(s), {} matched file event(s)",
                    results.len(),
                    self.matched_files
                );
            }
        }
    }
}

/// Cooperative cancellation shared between the caller and a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_and_senders_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |e: ScanEvent| seen.push(e);
            sink.emit(ScanEvent::ProgressPercent(10));
        }
        assert_eq!(seen, vec![ScanEvent::ProgressPercent(10)]);

        let (mut tx, rx) = std::sync::mpsc::channel();
        tx.emit(ScanEvent::StatusMessage("hi".into()));
        assert_eq!(rx.recv().ok(), Some(ScanEvent::StatusMessage("hi".into())));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
