//! Feedback arc set by random vertex ordering.
//!
//! Shuffle the vertices; every edge pointing backwards in that order is
//! removed. What remains respects a topological order, so it is acyclic.

use crate::{Graph, Problem};
use rand::seq::SliceRandom;
use rand::RngCore;
use shmring::Candidate;

pub struct FeedbackArcSet {
    graph: Graph,
    order: Vec<usize>,
    position: Vec<usize>,
}

impl FeedbackArcSet {
    pub fn new(graph: Graph) -> Self {
        let n = graph.vertex_count();
        Self {
            graph,
            order: (0..n).collect(),
            position: vec![0; n],
        }
    }
}

impl Problem for FeedbackArcSet {
    fn generate(&mut self, rng: &mut dyn RngCore, limit: usize) -> Option<Candidate> {
        self.order.shuffle(rng);
        for (pos, &vertex) in self.order.iter().enumerate() {
            self.position[vertex] = pos;
        }

        let mut candidate = Candidate::new();
        for (&edge, &(u, v)) in self.graph.edges().iter().zip(self.graph.index_pairs()) {
            if self.position[u] > self.position[v] {
                candidate.push(edge).ok()?;
                if candidate.len() >= limit {
                    return None;
                }
            }
        }
        Some(candidate)
    }
}
