//! The optimization problems a generator can work on.

use crate::fb_arc_set::FeedbackArcSet;
use crate::three_color::ThreeColor;
use crate::{ArgsError, Graph};
use rand::RngCore;
use shmring::Candidate;
use std::fmt;
use std::str::FromStr;

/// A randomized heuristic producing edge-removal candidates.
pub trait Problem {
    /// Builds one candidate.
    ///
    /// Returns `None` when the candidate would remove `limit` or more edges,
    /// or more edges than a slot holds.
    fn generate(&mut self, rng: &mut dyn RngCore, limit: usize) -> Option<Candidate>;
}

/// Which problem supervisor and generators solve. Both sides must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemKind {
    /// Minimum feedback arc set: remove edges until the graph is acyclic.
    #[default]
    ArcSet,
    /// 3-coloring: remove edges until the graph is 3-colorable.
    ThreeColor,
}

impl ProblemKind {
    /// Creates the heuristic for `graph`.
    pub fn solver(self, graph: Graph) -> Box<dyn Problem> {
        match self {
            Self::ArcSet => Box::new(FeedbackArcSet::new(graph)),
            Self::ThreeColor => Box::new(ThreeColor::new(graph)),
        }
    }

    /// Printed when a candidate removes no edge.
    pub fn solved_message(self) -> &'static str {
        match self {
            Self::ArcSet => "The graph is acyclic!",
            Self::ThreeColor => "The graph is 3-colorable!",
        }
    }

    /// Printed when the candidate limit is reached without a perfect solution.
    pub fn unsolved_message(self, best: usize) -> String {
        let property = match self {
            Self::ArcSet => "acyclic",
            Self::ThreeColor => "3-colorable",
        };
        format!("The graph might not be {property}, best solution removes {best} edges.")
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArcSet => f.write_str("arcset"),
            Self::ThreeColor => f.write_str("color"),
        }
    }
}

impl FromStr for ProblemKind {
    type Err = ArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arcset" | "fb_arc_set" => Ok(Self::ArcSet),
            "color" | "3color" => Ok(Self::ThreeColor),
            other => Err(ArgsError::InvalidValue {
                flag: "--problem".into(),
                value: other.into(),
                reason: "expected `arcset` or `color`".into(),
            }),
        }
    }
}
