//! Error types for the solver library and binaries.

use shmring::{CandidateError, RingError};
use std::io;
use thiserror::Error;

/// Errors raised while reading a graph from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No edge was given.
    #[error("no edges given")]
    Empty,

    /// An argument is not of the form `u-v` with decimal vertex ids.
    #[error("`{0}` is not an edge of the form u-v (decimal vertex ids)")]
    Malformed(String),

    /// An edge connects a vertex with itself.
    #[error("`{0}` is a self-loop")]
    SelfLoop(String),
}

/// Errors raised while parsing command-line options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    /// `-h` or `--help` was given.
    #[error("help requested")]
    HelpRequested,

    /// An option that needs a value came last.
    #[error("option `{0}` requires a value")]
    MissingValue(String),

    /// An option value could not be parsed.
    #[error("invalid value `{value}` for `{flag}`: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },

    /// An option was given twice.
    #[error("option `{0}` given more than once")]
    Repeated(String),

    /// An option is not known.
    #[error("unknown option `{0}`")]
    UnknownOption(String),

    /// A positional argument where none is accepted.
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),
}

impl ArgsError {
    /// Returns `true` if the caller should print usage and exit successfully.
    #[inline]
    pub fn is_help(&self) -> bool {
        matches!(self, Self::HelpRequested)
    }
}

/// Errors of the generator and supervisor loops.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The shared ring failed.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// A candidate could not be built.
    #[error(transparent)]
    Candidate(#[from] CandidateError),

    /// Writing the solution output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
