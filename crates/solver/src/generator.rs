//! The generator loop: produce candidates, publish them until told to stop.

use crate::{Problem, SolverError};
use rand::RngCore;
use shmring::{CancelToken, Candidate, Producer, Publish, DEFAULT_MAX_ITEMS};
use tracing::{debug, info};

/// Counters reported when a generator exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Calls into the heuristic.
    pub attempts: u64,
    /// Candidates written to the ring.
    pub published: u64,
    /// Smallest candidate published.
    pub best: Option<usize>,
}

/// Runs until the supervisor requests shutdown or `cancel` is set.
///
/// Only candidates no worse than this generator's own best are published, so
/// the supervisor still receives a steady stream once a local optimum is hit.
pub fn run(
    producer: &Producer<Candidate>,
    problem: &mut dyn Problem,
    rng: &mut dyn RngCore,
    cancel: &CancelToken,
) -> Result<GeneratorStats, SolverError> {
    let mut stats = GeneratorStats::default();
    let mut limit = DEFAULT_MAX_ITEMS + 1;

    while !cancel.is_cancelled() && !producer.is_shutdown() {
        stats.attempts += 1;
        let Some(candidate) = problem.generate(rng, limit) else {
            continue;
        };

        match producer.publish(&candidate, cancel)? {
            Publish::Published => {
                stats.published += 1;
                if stats.best.map_or(true, |best| candidate.len() < best) {
                    debug!(edges = candidate.len(), "new local best");
                    stats.best = Some(candidate.len());
                }
                limit = candidate.len() + 1;
            }
            Publish::Stop => break,
        }
    }

    info!(
        attempts = stats.attempts,
        published = stats.published,
        best = ?stats.best,
        "generator stopping"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Graph, ProblemKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shmring::{ResourceNames, RingBuffer, RingConfig};
    use std::thread;

    #[test]
    fn test_generator_stops_on_shutdown() {
        let names = ResourceNames::from_prefix(&format!("solver_gen_{}", std::process::id()))
            .unwrap();
        let mut ring = RingBuffer::<Candidate>::create(&names, RingConfig::new(2, 1)).unwrap();
        let cancel = CancelToken::new();

        let worker = {
            let names = names.clone();
            thread::spawn(move || {
                let producer = Producer::<Candidate>::attach(&names).unwrap();
                let graph = Graph::parse(["0-1", "1-2", "2-0"]).unwrap();
                let mut problem = ProblemKind::ArcSet.solver(graph);
                let mut rng = StdRng::seed_from_u64(9);
                run(&producer, problem.as_mut(), &mut rng, &CancelToken::new()).unwrap()
            })
        };

        let mut sizes = Vec::new();
        for _ in 0..5 {
            let candidate = ring.consume(&cancel).unwrap().into_item().unwrap();
            sizes.push(candidate.len());
        }
        ring.request_shutdown().unwrap();
        let stats = worker.join().unwrap();

        // A directed triangle loses one or two edges depending on the order;
        // once a single-edge candidate is published nothing larger follows.
        assert!(sizes.iter().all(|&n| n == 1 || n == 2));
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]), "sizes grew: {sizes:?}");
        assert!(stats.published >= 5);
        assert!(stats.best.is_some_and(|best| sizes.iter().all(|&n| best <= n)));
        assert!(ring.metrics().published >= 5);
    }
}
