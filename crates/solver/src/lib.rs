//! solver - Randomized Graph Heuristics over a Shared Ring
//!
//! Generators repeatedly build random candidate solutions for a graph problem
//! and publish them through a [`shmring`] ring; one supervisor consumes them,
//! prints every improvement and stops everyone once a perfect solution shows
//! up, a candidate limit is reached, or it is interrupted.
//!
//! Problems:
//! - feedback arc set ([`fb_arc_set`]): edges to remove to make a digraph acyclic
//! - 3-coloring ([`three_color`]): edges to remove to make a graph 3-colorable
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use solver::{Graph, ProblemKind};
//!
//! let graph = Graph::parse(["0-1", "1-2", "2-0"]).unwrap();
//! let mut problem = ProblemKind::ArcSet.solver(graph);
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! // Any vertex order breaks the triangle by removing one or two edges.
//! let candidate = problem.generate(&mut rng, usize::MAX).unwrap();
//! assert!((1..=2).contains(&candidate.len()));
//! ```

pub mod args;
mod error;
pub mod fb_arc_set;
pub mod generator;
mod graph;
mod problem;
pub mod supervisor;
mod telemetry;
pub mod three_color;

pub use error::{ArgsError, GraphError, SolverError};
pub use graph::{parse_edge, Graph};
pub use problem::{Problem, ProblemKind};
pub use telemetry::{init_tracing, DEFAULT_LOG_LEVEL};
