//! Cooperative cancellation and the supervisor's shutdown state.

use crate::RingMetrics;
use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// A cloneable flag checked by generation loops and blocking ring calls.
///
/// Cancelling does not wake a blocked semaphore wait by itself; a delivered
/// signal (see [`install_signal_handlers`]) or the supervisor's wake-up burst
/// does. The flag decides what happens after the wake-up.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Where a ring is in the shutdown handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Producers publish, the supervisor consumes.
    Running,
    /// The flag is set and the wake-up burst was posted.
    ShutdownRequested,
    /// Producers are gone (or the drain timed out) and resources are released.
    Drained,
}

/// Outcome of [`RingBuffer::drain`](crate::RingBuffer::drain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// `true` if every producer detached before the timeout.
    pub detached: bool,
    /// Producers still attached when the resources were released.
    pub still_attached: u32,
    /// Final traffic counters.
    pub metrics: RingMetrics,
    pub phase: ShutdownPhase,
}

static SIGNAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_termination_signal(_signal: libc::c_int) {
    // Only an atomic load and store happen here.
    if let Some(token) = SIGNAL_TOKEN.get() {
        token.cancel();
    }
}

/// Routes SIGINT and SIGTERM to a process-wide [`CancelToken`] and returns it.
///
/// Handlers are installed without `SA_RESTART`, so a blocked `sem_wait`
/// returns `EINTR` and the ring call re-checks the token. Calling this again
/// returns the same token.
pub fn install_signal_handlers() -> io::Result<CancelToken> {
    let token = SIGNAL_TOKEN.get_or_init(CancelToken::new).clone();

    // SAFETY: `action` is fully initialized before use and the handler only
    // touches atomics.
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = on_termination_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);

        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &action, ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }

    Ok(token)
}
