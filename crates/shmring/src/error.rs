//! Error types for shared ring operations.

use std::fmt;
use std::io;
use thiserror::Error;

/// Kind of named OS object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Segment,
    Semaphore,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment => f.write_str("shared memory segment"),
            Self::Semaphore => f.write_str("semaphore"),
        }
    }
}

/// Errors that can occur while creating, attaching or operating a ring.
#[derive(Debug, Error)]
pub enum RingError {
    /// The object already exists, usually left behind by a crashed supervisor.
    #[error("{resource} `{name}` already exists; a previous supervisor may have crashed (remove it or run with --cleanup)")]
    AlreadyExists {
        resource: Resource,
        name: String,
    },

    /// The object does not exist.
    #[error("{resource} `{name}` does not exist; is the supervisor running?")]
    NotFound {
        resource: Resource,
        name: String,
    },

    /// Creating the object failed for another reason.
    #[error("failed to create {resource} `{name}`: {source}")]
    Create {
        resource: Resource,
        name: String,
        #[source]
        source: io::Error,
    },

    /// Opening or mapping an existing object failed.
    #[error("failed to attach {resource} `{name}`: {source}")]
    Attach {
        resource: Resource,
        name: String,
        #[source]
        source: io::Error,
    },

    /// The segment was created for a different payload or protocol version.
    #[error("shared memory segment `{name}` has an incompatible layout: {reason}")]
    Layout { name: String, reason: String },

    /// Capacity, producer count or resource prefix is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every producer slot of the segment is taken.
    #[error("too many producers attached (max: {max})")]
    TooManyProducers {
        /// The configured maximum number of producers.
        max: usize,
    },

    /// `sem_wait` failed with something other than `EINTR`.
    #[error("waiting on semaphore `{name}` failed: {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    /// `sem_post` failed.
    #[error("posting semaphore `{name}` failed: {source}")]
    Post {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Removing a stale object failed.
    #[error("failed to remove {resource} `{name}`: {source}")]
    Unlink {
        resource: Resource,
        name: String,
        #[source]
        source: io::Error,
    },
}

impl RingError {
    /// Maps an `shm_open`/`sem_open` failure to the matching variant.
    pub(crate) fn from_open(resource: Resource, name: &str, err: io::Error, creating: bool) -> Self {
        let name = name.to_string();
        match err.raw_os_error() {
            Some(libc::EEXIST) => Self::AlreadyExists { resource, name },
            Some(libc::ENOENT) => Self::NotFound { resource, name },
            _ if creating => Self::Create {
                resource,
                name,
                source: err,
            },
            _ => Self::Attach {
                resource,
                name,
                source: err,
            },
        }
    }

    /// Returns `true` if the error names a leftover object from an earlier run.
    #[inline]
    pub fn is_stale_resource(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if the supervisor side is missing.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while building a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CandidateError {
    /// The candidate would not fit into a slot.
    #[error("candidate exceeds the slot limit of {max} items")]
    Full {
        /// Items a slot can hold.
        max: usize,
    },
}
