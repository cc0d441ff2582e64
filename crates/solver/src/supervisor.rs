//! The supervisor loop: consume candidates, keep the best, decide when to stop.

use crate::{ProblemKind, SolverError};
use shmring::{CancelToken, Candidate, Consume, RingBuffer};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long `consume` waits before checking for a stuck writer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Stop after this many candidates (`-n`).
    pub limit: Option<u64>,
    /// Timeout of a single consume; stale writers are checked in between.
    pub poll_interval: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            limit: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A candidate removing no edge arrived.
    Solved,
    /// The candidate limit was reached first.
    LimitReached,
    /// SIGINT/SIGTERM or cancellation.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub outcome: Outcome,
    /// Best candidate seen, if any.
    pub best: Option<Candidate>,
    /// Candidates consumed.
    pub received: u64,
}

/// Consumes until solved, limited or interrupted, writing solution lines to
/// `out`. Shutdown is requested on every exit path, including errors.
pub fn run<W: Write>(
    ring: &mut RingBuffer<Candidate>,
    kind: ProblemKind,
    options: &SupervisorOptions,
    cancel: &CancelToken,
    out: &mut W,
) -> Result<Report, SolverError> {
    let result = consume_loop(ring, kind, options, cancel, out);
    let shutdown = ring.request_shutdown();
    let report = result?;
    shutdown?;
    Ok(report)
}

fn consume_loop<W: Write>(
    ring: &mut RingBuffer<Candidate>,
    kind: ProblemKind,
    options: &SupervisorOptions,
    cancel: &CancelToken,
    out: &mut W,
) -> Result<Report, SolverError> {
    let mut best: Option<Candidate> = None;
    let mut received = 0u64;

    let outcome = loop {
        if cancel.is_cancelled() {
            break Outcome::Interrupted;
        }

        let candidate = match ring.consume_timeout(options.poll_interval, cancel)? {
            Consume::Item(candidate) => candidate,
            Consume::Terminated => break Outcome::Interrupted,
            Consume::TimedOut => {
                if ring.recover_stale_writer()? {
                    warn!("recovered the ring from a crashed generator");
                }
                continue;
            }
        };
        received += 1;
        debug!(edges = candidate.len(), received, "candidate");

        if best.map_or(true, |b| candidate.len() < b.len()) {
            best = Some(candidate);
            if candidate.is_empty() {
                writeln!(out, "{}", kind.solved_message())?;
                break Outcome::Solved;
            }
            writeln!(
                out,
                "Solution with {} edges: {}",
                candidate.len(),
                candidate
            )?;
            out.flush()?;
        }

        if options.limit.is_some_and(|limit| received >= limit) {
            // `best` is set: at least one candidate arrived.
            let edges = best.map_or(0, |b| b.len());
            writeln!(out, "{}", kind.unsolved_message(edges))?;
            break Outcome::LimitReached;
        }
    };
    out.flush()?;

    info!(?outcome, received, best = ?best.map(|b| b.len()), "supervisor finished");
    Ok(Report {
        outcome,
        best,
        received,
    })
}
