//! 3-coloring by random vertex coloring.
//!
//! Color every vertex at random; every edge joining two vertices of the same
//! color is removed. The remaining graph is properly 3-colored.

use crate::{Graph, Problem};
use rand::{Rng, RngCore};
use shmring::Candidate;

const COLORS: u8 = 3;

pub struct ThreeColor {
    graph: Graph,
    colors: Vec<u8>,
}

impl ThreeColor {
    pub fn new(graph: Graph) -> Self {
        let n = graph.vertex_count();
        Self {
            graph,
            colors: vec![0; n],
        }
    }
}

impl Problem for ThreeColor {
    fn generate(&mut self, rng: &mut dyn RngCore, limit: usize) -> Option<Candidate> {
        for color in &mut self.colors {
            *color = rng.gen_range(0..COLORS);
        }

        let mut candidate = Candidate::new();
        for (&edge, &(u, v)) in self.graph.edges().iter().zip(self.graph.index_pairs()) {
            if self.colors[u] == self.colors[v] {
                candidate.push(edge).ok()?;
                if candidate.len() >= limit {
                    return None;
                }
            }
        }
        Some(candidate)
    }
}
