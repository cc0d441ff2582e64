//! Helpers shared by the signal test binaries.

#![allow(dead_code)]

use shmring::ResourceNames;
use std::os::unix::thread::JoinHandleExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Long enough for a thread that is going to block to reach its wait.
pub const SETTLE: Duration = Duration::from_millis(150);

pub fn names(tag: &str) -> ResourceNames {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    ResourceNames::from_prefix(&format!(
        "shmring_sig_{}_{}_{}",
        tag,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
    .unwrap()
}

/// Sends `signal` to the thread behind `handle`.
pub fn signal_thread<T>(handle: &thread::JoinHandle<T>, signal: libc::c_int) {
    // SAFETY: the thread has not been joined, so its pthread_t is valid.
    let rc = unsafe { libc::pthread_kill(handle.as_pthread_t(), signal) };
    assert_eq!(rc, 0);
}

/// Sends `signal` to `handle`'s thread until it finishes.
///
/// A signal that lands before the thread blocks is lost, so keep sending.
pub fn interrupt_until_done<T>(handle: thread::JoinHandle<T>, signal: libc::c_int) -> T {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "blocked call was never interrupted");
        signal_thread(&handle, signal);
        thread::sleep(Duration::from_millis(20));
    }
    handle.join().unwrap()
}
