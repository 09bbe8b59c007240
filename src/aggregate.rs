//! Serializes results to the primary output as JSON Lines.

use std::io::{self, Write};

use futures::{Stream, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::debug;

use crate::generate::CandidateSet;
use crate::probe::ErrorKind;
use crate::verify::VerificationResult;

/// Counts over one verification pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub resolved: usize,
    pub tls_reachable: usize,
    pub http_reachable: usize,
    pub errors: usize,
    pub cancelled: usize,
}

impl RunSummary {
    fn tally(&mut self, result: &VerificationResult) {
        self.total += 1;
        if result.dns_resolved {
            self.resolved += 1;
        }
        if result.tls_reachable == Some(true) {
            self.tls_reachable += 1;
        }
        if result.http_reachable == Some(true) {
            self.http_reachable += 1;
        }
        match &result.error {
            Some(err) if err.kind == ErrorKind::Cancelled => self.cancelled += 1,
            Some(_) => self.errors += 1,
            None => {}
        }
    }
}

/// Single writer for the result stream. Writes in arrival order, one line per
/// result, flushed as it goes.
pub struct Aggregator<W: Write> {
    out: W,
    summary: RunSummary,
    progress: ProgressBar,
}

impl<W: Write> Aggregator<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            summary: RunSummary::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn record(&mut self, result: &VerificationResult) -> io::Result<()> {
        write_line(&mut self.out, result)?;
        self.summary.tally(result);
        self.progress.inc(1);
        if result.dns_resolved {
            self.progress.set_message(result.candidate.domain.clone());
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub async fn consume<S>(mut self, mut results: S) -> io::Result<RunSummary>
    where
        S: Stream<Item = VerificationResult> + Unpin,
    {
        while let Some(result) = results.next().await {
            self.record(&result)?;
        }
        debug!(total = self.summary.total, "result stream exhausted");
        Ok(self.summary)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Generate-only output: one candidate per line, in generation order.
pub fn write_candidates<W: Write>(mut out: W, candidates: &CandidateSet) -> io::Result<usize> {
    for candidate in candidates {
        write_line(&mut out, candidate)?;
    }
    Ok(candidates.len())
}

fn write_line<W: Write, T: Serialize>(out: &mut W, record: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    out.flush()
}
