//! shmring - Bounded MPSC Ring Buffer in POSIX Shared Memory
//!
//! A fixed-capacity circular buffer living in a named shared memory segment,
//! written by many generator processes and read by one supervisor process.
//! Three named semaphores coordinate access:
//!
//! - `free`: slots producers may fill (initial value = capacity)
//! - `used`: slots the supervisor may read (initial value = 0)
//! - `write`: mutual exclusion among producers
//!
//! Shutdown is a two-phase handshake: the supervisor sets a flag in the
//! segment and posts one `free` token per possible producer, so no producer
//! stays blocked on a full ring.
//!
//! # Key Features
//!
//! - Fixed-size `#[repr(C)]` payloads ([`SlotPayload`], [`Candidate`])
//! - EINTR-aware waits driven by a [`CancelToken`]
//! - Layout validation when attaching (magic, version, slot size)
//! - Recovery from a generator that died holding the write mutex
//!
//! # Example
//!
//! ```no_run
//! use shmring::{CancelToken, Consume, Producer, ResourceNames, RingBuffer, RingConfig};
//!
//! # fn main() -> Result<(), shmring::RingError> {
//! let names = ResourceNames::from_prefix("demo")?;
//! let mut ring = RingBuffer::<u64>::create(&names, RingConfig::default())?;
//! let cancel = CancelToken::new();
//!
//! // Normally in another process.
//! let producer = Producer::<u64>::attach(&names)?;
//! producer.publish(&42, &cancel)?;
//!
//! if let Consume::Item(value) = ring.consume(&cancel)? {
//!     println!("Received: {}", value);
//! }
//!
//! drop(producer);
//! ring.drain(std::time::Duration::from_secs(1))?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod candidate;
mod config;
mod error;
mod invariants;
mod metrics;
mod ring;
mod segment;
mod semaphore;
mod shutdown;

pub use backoff::Backoff;
pub use candidate::{Candidate, Edge, SlotPayload, DEFAULT_MAX_ITEMS};
pub use config::{
    prefix_from_env, ResourceNames, RingConfig, DEFAULT_PREFIX, PREFIX_ENV, SMALL_CONFIG,
    WIDE_CONFIG,
};
pub use error::{CandidateError, Resource, RingError};
pub use metrics::{RingMetrics, SlotCounts};
pub use ring::{remove_stale_resources, Consume, Producer, Publish, RingBuffer};
pub use semaphore::WaitOutcome;
pub use shutdown::{install_signal_handlers, CancelToken, DrainReport, ShutdownPhase};
