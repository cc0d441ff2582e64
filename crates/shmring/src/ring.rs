use crate::invariants::{debug_assert_bounded_count, debug_assert_cursor_in_range};
use crate::segment::{SegmentHeader, SegmentLayout, SharedSegment};
use crate::semaphore::{NamedSemaphore, WaitOutcome};
use crate::{
    Backoff, CancelToken, DrainReport, Resource, ResourceNames, RingConfig, RingError,
    RingMetrics, ShutdownPhase, SlotCounts, SlotPayload,
};
use std::cell::Cell;
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// =============================================================================
// SYNCHRONIZATION PROTOCOL
// =============================================================================
//
// Three named semaphores guard the slots in the shared segment:
//
// - `free`  (initial CAPACITY): a token per slot a producer may fill
// - `used`  (initial 0):        a token per slot the supervisor may read
// - `write` (initial 1):        owner of `write_pos`
//
// **Producer (publish):**
// 1. wait `free`   (buffer full → block; never while holding `write`)
// 2. wait `write`
// 3. re-check `shutdown`; if set, post `write` and stop without writing
// 4. copy into slots[write_pos], advance write_pos
// 5. post `write`, post `used`
//
// **Supervisor (consume):**
// 1. wait `used`
// 2. copy out of slots[read_pos], advance read_pos
// 3. post `free`
//
// sem_wait/sem_post synchronize memory, so cursors and slot bytes are
// accessed with Relaxed ordering (the header atomics exist to make the
// cross-process accesses well defined, not to order them).
//
// ## Shutdown
//
// The supervisor sets `shutdown` once and posts `free` max_producers times.
// Every producer blocked in step 1 wakes, sees the flag in step 3 and stops.
// A stopping producer keeps the token it took; the wake-up tokens are never
// used for real writes, so capacity is never exceeded.
//
// ## Known hazard
//
// A producer killed between steps 2 and 5 never posts `write`, and every
// other producer blocks forever in step 2. `writer_pid` records the holder
// so the supervisor can detect a dead holder and post `write` on its behalf
// (see `RingBuffer::recover_stale_writer`). Two windows are not detectable
// because `writer_pid` is zero in both: after taking `write` but before
// recording the pid, and after clearing the pid but before posting `write`.
//
// Recovery only returns `write`. The dead producer's `free` token is gone,
// so the ring has one slot less from then on. If it died after advancing
// `write_pos` but before posting `used`, its item is also never counted and
// the supervisor stays one item behind `write_pos` for good.
//
// =============================================================================

/// Result of [`Producer::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The item is stored and visible to the supervisor.
    Published,
    /// Shutdown (or cancellation) was observed; nothing was written.
    Stop,
}

/// Result of the consuming calls of [`RingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consume<T> {
    /// The next item in write order.
    Item(T),
    /// The wait was interrupted after shutdown or cancellation.
    Terminated,
    /// `consume_timeout` expired without an item.
    TimedOut,
}

impl<T> Consume<T> {
    /// Returns the item, if any.
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Terminated | Self::TimedOut => None,
        }
    }
}

/// Segment plus the three semaphores. Shared by both roles.
#[derive(Debug)]
struct RingInner<T> {
    segment: SharedSegment,
    free_slots: NamedSemaphore,
    used_slots: NamedSemaphore,
    write_mutex: NamedSemaphore,
    capacity: usize,
    max_producers: usize,
    _marker: PhantomData<T>,
}

impl<T: SlotPayload> RingInner<T> {
    #[inline]
    fn header(&self) -> &SegmentHeader {
        self.segment.header()
    }

    #[inline]
    fn is_shutdown(&self) -> bool {
        self.header().shutdown.load(Ordering::Acquire)
    }

    #[inline]
    fn should_stop(&self, cancel: &CancelToken) -> bool {
        self.is_shutdown() || cancel.is_cancelled()
    }

    /// Waits for a token, retrying on `EINTR` until shutdown or cancellation
    /// is observed. Returns `false` in that case.
    fn acquire(&self, sem: &NamedSemaphore, cancel: &CancelToken) -> Result<bool, RingError> {
        loop {
            match sem.wait()? {
                WaitOutcome::Acquired => return Ok(true),
                WaitOutcome::Interrupted if self.should_stop(cancel) => return Ok(false),
                WaitOutcome::Interrupted | WaitOutcome::TimedOut => {
                    debug!(semaphore = sem.name(), "wait interrupted, retrying");
                }
            }
        }
    }

    fn slot_counts(&self) -> Result<SlotCounts, RingError> {
        Ok(SlotCounts {
            free: self.free_slots.value()?,
            used: self.used_slots.value()?,
        })
    }
}

/// The supervisor's side of the ring: creates the shared resources, consumes
/// candidates, and owns the shutdown handshake.
///
/// Dropping it (or calling [`drain`](Self::drain)) unmaps and unlinks the
/// segment and the semaphores.
#[derive(Debug)]
pub struct RingBuffer<T: SlotPayload> {
    inner: RingInner<T>,
    names: ResourceNames,
    consumed: u64,
}

impl<T: SlotPayload> RingBuffer<T> {
    /// Creates the segment and semaphores. Fails with
    /// [`RingError::AlreadyExists`] if any of them survived an earlier run.
    pub fn create(names: &ResourceNames, config: RingConfig) -> Result<Self, RingError> {
        config.validate()?;
        if mem::size_of::<T>() == 0 {
            return Err(RingError::InvalidConfig("slot payload has zero size".into()));
        }

        // Each resource unlinks itself on drop, so a failure part way
        // through removes what was already created.
        let layout = SegmentLayout::for_slots::<T>(config.capacity, config.max_producers);
        let segment = SharedSegment::create(&names.shm, &layout)?;
        let free_slots = NamedSemaphore::create(&names.free, config.capacity as u32)?;
        let used_slots = NamedSemaphore::create(&names.used, 0)?;
        let write_mutex = NamedSemaphore::create(&names.write, 1)?;

        info!(
            segment = %names.shm,
            capacity = config.capacity,
            max_producers = config.max_producers,
            slot_size = layout.slot_size,
            bytes = segment.mapped_len(),
            "ring created"
        );

        Ok(Self {
            inner: RingInner {
                segment,
                free_slots,
                used_slots,
                write_mutex,
                capacity: config.capacity,
                max_producers: config.max_producers,
                _marker: PhantomData,
            },
            names: names.clone(),
            consumed: 0,
        })
    }

    /// Blocks until a candidate is available.
    ///
    /// An interrupted wait is retried unless shutdown was requested or
    /// `cancel` is set, in which case [`Consume::Terminated`] is returned.
    pub fn consume(&mut self, cancel: &CancelToken) -> Result<Consume<T>, RingError> {
        loop {
            match self.inner.used_slots.wait()? {
                WaitOutcome::Acquired => return self.take_slot().map(Consume::Item),
                WaitOutcome::Interrupted if self.inner.should_stop(cancel) => {
                    return Ok(Consume::Terminated)
                }
                WaitOutcome::Interrupted | WaitOutcome::TimedOut => {}
            }
        }
    }

    /// Like [`consume`](Self::consume) but gives up after `timeout`.
    pub fn consume_timeout(
        &mut self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Consume<T>, RingError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Consume::TimedOut);
            }
            match self.inner.used_slots.wait_timeout(remaining)? {
                WaitOutcome::Acquired => return self.take_slot().map(Consume::Item),
                WaitOutcome::TimedOut => return Ok(Consume::TimedOut),
                WaitOutcome::Interrupted if self.inner.should_stop(cancel) => {
                    return Ok(Consume::Terminated)
                }
                WaitOutcome::Interrupted => {}
            }
        }
    }

    /// Takes a candidate only if one is ready.
    pub fn try_consume(&mut self) -> Result<Option<T>, RingError> {
        if self.inner.used_slots.try_wait()? {
            self.take_slot().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Copies the slot at `read_pos` out and hands the slot back to producers.
    /// Caller must hold a `used` token.
    fn take_slot(&mut self) -> Result<T, RingError> {
        let header = self.inner.header();
        let capacity = self.inner.capacity;
        let pos = header.read_pos.load(Ordering::Relaxed) as usize;
        debug_assert_cursor_in_range!("read_pos", pos, capacity);

        // SAFETY: the `used` token guarantees the slot was fully written and
        // no producer can reuse it until `free` is posted below.
        let item = unsafe { ptr::read(self.inner.segment.slot::<T>(pos)) };

        let unread = header
            .published
            .load(Ordering::Relaxed)
            .saturating_sub(self.consumed);
        debug_assert_bounded_count!(unread, capacity);

        header
            .read_pos
            .store(((pos + 1) % capacity) as u32, Ordering::Relaxed);
        self.consumed += 1;
        self.inner.free_slots.post()?;
        Ok(item)
    }

    /// Sets the shutdown flag and posts one `free` token per possible
    /// producer so that every blocked producer wakes and stops.
    ///
    /// Idempotent: only the first call posts the burst.
    pub fn request_shutdown(&self) -> Result<(), RingError> {
        if self.inner.header().shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(
            segment = %self.names.shm,
            burst = self.inner.max_producers,
            "shutdown requested"
        );
        for _ in 0..self.inner.max_producers {
            self.inner.free_slots.post()?;
        }
        Ok(())
    }

    /// Returns `true` once [`request_shutdown`](Self::request_shutdown) ran.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Current phase of the shutdown handshake.
    pub fn phase(&self) -> ShutdownPhase {
        if self.is_shutdown() {
            ShutdownPhase::ShutdownRequested
        } else {
            ShutdownPhase::Running
        }
    }

    /// Requests shutdown, waits up to `timeout` for every producer to detach,
    /// then releases the shared resources.
    ///
    /// Producers that crashed never detach; they only delay this call by
    /// `timeout`.
    pub fn drain(self, timeout: Duration) -> Result<DrainReport, RingError> {
        self.request_shutdown()?;

        let attached = &self.inner.header().attached;
        let detached = Backoff::new().wait_until(Instant::now() + timeout, || {
            attached.load(Ordering::Acquire) == 0
        });
        let still_attached = attached.load(Ordering::Acquire);
        let metrics = self.metrics();

        if detached {
            info!(segment = %self.names.shm, consumed = metrics.consumed, "ring drained");
        } else {
            warn!(
                segment = %self.names.shm,
                still_attached,
                "producers still attached after drain timeout; releasing anyway"
            );
        }

        drop(self);
        Ok(DrainReport {
            detached,
            still_attached,
            metrics,
            phase: ShutdownPhase::Drained,
        })
    }

    /// Pid of a producer that died while holding the write mutex.
    pub fn stale_writer(&self) -> Option<i32> {
        let pid = self.inner.header().writer_pid.load(Ordering::Acquire);
        if pid <= 0 || process_alive(pid) {
            None
        } else {
            Some(pid)
        }
    }

    /// Releases the write mutex on behalf of a dead holder.
    ///
    /// Returns `true` if a stale holder was found and the mutex posted. The
    /// dead producer's `free` token is not returned, and if it had already
    /// advanced `write_pos` its `used` token is missing too. Both losses are
    /// permanent for this ring.
    pub fn recover_stale_writer(&self) -> Result<bool, RingError> {
        let Some(pid) = self.stale_writer() else {
            return Ok(false);
        };
        let header = self.inner.header();
        if header
            .writer_pid
            .compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        warn!(pid, segment = %self.names.shm, "generator died holding the write mutex; releasing it");
        self.inner.write_mutex.post()?;
        Ok(true)
    }

    /// Traffic counters.
    pub fn metrics(&self) -> RingMetrics {
        RingMetrics {
            published: self.inner.header().published.load(Ordering::Relaxed),
            consumed: self.consumed,
        }
    }

    /// Candidates written but not yet consumed.
    pub fn len(&self) -> usize {
        self.metrics().unread() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current free/used token counts.
    pub fn slot_counts(&self) -> Result<SlotCounts, RingError> {
        self.inner.slot_counts()
    }

    /// Producers currently attached.
    pub fn attached(&self) -> u32 {
        self.inner.header().attached.load(Ordering::Acquire)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[inline]
    pub fn max_producers(&self) -> usize {
        self.inner.max_producers
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }
}

/// A generator's handle on a ring created by the supervisor.
///
/// Attaching registers the producer in the segment; dropping detaches and
/// closes the handles without unlinking anything.
///
/// The shutdown burst wakes one blocked publish per registered producer, so
/// a handle can move to another thread but not be shared between threads.
/// Each publishing thread attaches its own:
///
/// ```compile_fail
/// use shmring::Producer;
///
/// fn shared<T: Sync>() {}
/// shared::<Producer<u64>>();
/// ```
pub struct Producer<T: SlotPayload> {
    inner: RingInner<T>,
    pid: i32,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T: SlotPayload> Producer<T> {
    /// Opens the segment and semaphores created under `names`.
    pub fn attach(names: &ResourceNames) -> Result<Self, RingError> {
        let segment = SharedSegment::attach(&names.shm, mem::size_of::<T>(), mem::align_of::<T>())?;
        let free_slots = NamedSemaphore::open(&names.free)?;
        let used_slots = NamedSemaphore::open(&names.used)?;
        let write_mutex = NamedSemaphore::open(&names.write)?;

        let header = segment.header();
        let capacity = header.capacity as usize;
        let max_producers = header.max_producers as usize;

        // Register last so a failed open never leaks a registration.
        header
            .attached
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                ((n as usize) < max_producers).then_some(n + 1)
            })
            .map_err(|_| RingError::TooManyProducers { max: max_producers })?;

        // SAFETY: getpid cannot fail.
        let pid = unsafe { libc::getpid() };
        debug!(segment = %names.shm, pid, capacity, "producer attached");

        Ok(Self {
            inner: RingInner {
                segment,
                free_slots,
                used_slots,
                write_mutex,
                capacity,
                max_producers,
                _marker: PhantomData,
            },
            pid,
            _not_sync: PhantomData,
        })
    }

    /// Stores `item` in the next free slot, blocking while the ring is full.
    ///
    /// Returns [`Publish::Stop`] without writing once shutdown is observed,
    /// or when a signal interrupts a wait and `cancel` is set.
    pub fn publish(&self, item: &T, cancel: &CancelToken) -> Result<Publish, RingError> {
        let inner = &self.inner;
        if inner.should_stop(cancel) {
            return Ok(Publish::Stop);
        }

        if !inner.acquire(&inner.free_slots, cancel)? {
            return Ok(Publish::Stop);
        }
        if !inner.acquire(&inner.write_mutex, cancel)? {
            self.release_unused_slot()?;
            return Ok(Publish::Stop);
        }

        let header = inner.header();
        if header.shutdown.load(Ordering::Acquire) {
            inner.write_mutex.post()?;
            return Ok(Publish::Stop);
        }

        header.writer_pid.store(self.pid, Ordering::Release);
        let pos = header.write_pos.load(Ordering::Relaxed) as usize;
        debug_assert_cursor_in_range!("write_pos", pos, inner.capacity);

        // SAFETY: the `free` token reserves one slot and the write mutex
        // makes `pos` ours; the supervisor does not read it before `used`
        // is posted.
        unsafe { ptr::write(inner.segment.slot::<T>(pos), *item) };

        header
            .write_pos
            .store(((pos + 1) % inner.capacity) as u32, Ordering::Relaxed);
        header.published.fetch_add(1, Ordering::Relaxed);
        header.writer_pid.store(0, Ordering::Release);

        inner.write_mutex.post()?;
        inner.used_slots.post()?;
        Ok(Publish::Published)
    }

    /// A producer stopping for its own cancellation (not shutdown) hands its
    /// `free` token back so the ring keeps its capacity.
    fn release_unused_slot(&self) -> Result<(), RingError> {
        if !self.inner.is_shutdown() {
            self.inner.free_slots.post()?;
        }
        Ok(())
    }

    /// Non-blocking check of the shutdown flag.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Current free/used token counts.
    pub fn slot_counts(&self) -> Result<SlotCounts, RingError> {
        self.inner.slot_counts()
    }
}

impl<T: SlotPayload> Drop for Producer<T> {
    fn drop(&mut self) {
        self.inner.header().attached.fetch_sub(1, Ordering::AcqRel);
        debug!(segment = self.inner.segment.name(), pid = self.pid, "producer detached");
    }
}

/// Removes segment and semaphores left behind by a crashed supervisor.
///
/// Missing objects are skipped. Returns how many objects were removed.
pub fn remove_stale_resources(names: &ResourceNames) -> Result<usize, RingError> {
    let mut removed = 0;
    let unlink_error = |resource, name: &str, source: io::Error| RingError::Unlink {
        resource,
        name: name.to_string(),
        source,
    };

    match SharedSegment::unlink(&names.shm) {
        Ok(()) => removed += 1,
        Err(err) if err.raw_os_error() == Some(libc::ENOENT) => {}
        Err(err) => return Err(unlink_error(Resource::Segment, &names.shm, err)),
    }
    for name in names.semaphores() {
        match NamedSemaphore::unlink(name) {
            Ok(()) => removed += 1,
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => {}
            Err(err) => return Err(unlink_error(Resource::Semaphore, name, err)),
        }
    }

    if removed > 0 {
        info!(prefix_segment = %names.shm, removed, "removed stale resources");
    }
    Ok(removed)
}

fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only performs the existence and permission checks.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to someone else.
    io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}
