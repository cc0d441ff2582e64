use crate::RingError;

/// Prefix used for resource names when none is configured.
pub const DEFAULT_PREFIX: &str = "shmring";

/// Environment variable consulted by [`prefix_from_env`].
pub const PREFIX_ENV: &str = "SHMRING_PREFIX";

// sem_open(3) prepends "sem." and NAME_MAX is 255.
const MAX_PREFIX_LEN: usize = 200;

/// Configuration for a shared ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of slots in the ring (default: 16)
    pub capacity: usize,
    /// Maximum number of attached producers. Also the size of the
    /// shutdown wake-up burst posted to the free-slot semaphore.
    pub max_producers: usize,
}

impl RingConfig {
    /// Creates a new configuration with custom settings.
    pub const fn new(capacity: usize, max_producers: usize) -> Self {
        Self {
            capacity,
            max_producers,
        }
    }

    /// Sets the number of slots.
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the maximum number of producers.
    pub const fn with_max_producers(mut self, max_producers: usize) -> Self {
        self.max_producers = max_producers;
        self
    }

    /// Checks the limits imposed by the segment header and by `SEM_VALUE_MAX`.
    pub fn validate(&self) -> Result<(), RingError> {
        if self.capacity == 0 {
            return Err(RingError::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.max_producers == 0 {
            return Err(RingError::InvalidConfig(
                "max_producers must be at least 1".into(),
            ));
        }
        // free_slots can hold every slot plus one burst token per producer.
        let peak = self.capacity.checked_add(self.max_producers);
        if peak.map_or(true, |peak| peak > i32::MAX as usize) {
            return Err(RingError::InvalidConfig(format!(
                "capacity {} plus max_producers {} exceeds the semaphore limit",
                self.capacity, self.max_producers
            )));
        }
        Ok(())
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            max_producers: 64,
        }
    }
}

/// Small ring used by tests and demos (4 slots, 8 producers)
pub const SMALL_CONFIG: RingConfig = RingConfig::new(4, 8);

/// Wide ring for many concurrent generators (512 slots, 256 producers)
pub const WIDE_CONFIG: RingConfig = RingConfig::new(512, 256);

/// Names of the four POSIX objects backing one ring.
///
/// Supervisor and generators must derive these from the same prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// Shared memory object holding header and slots.
    pub shm: String,
    /// Counting semaphore of free slots.
    pub free: String,
    /// Counting semaphore of used slots.
    pub used: String,
    /// Binary semaphore guarding the write cursor.
    pub write: String,
}

impl ResourceNames {
    /// Derives `/<prefix>_shm`, `/<prefix>_free`, `/<prefix>_used` and
    /// `/<prefix>_write`.
    pub fn from_prefix(prefix: &str) -> Result<Self, RingError> {
        if prefix.is_empty() {
            return Err(RingError::InvalidConfig("resource prefix is empty".into()));
        }
        if prefix.len() > MAX_PREFIX_LEN {
            return Err(RingError::InvalidConfig(format!(
                "resource prefix is longer than {MAX_PREFIX_LEN} bytes"
            )));
        }
        if prefix.contains('/') || prefix.contains('\0') {
            return Err(RingError::InvalidConfig(format!(
                "resource prefix `{prefix}` must not contain '/' or NUL"
            )));
        }

        Ok(Self {
            shm: format!("/{prefix}_shm"),
            free: format!("/{prefix}_free"),
            used: format!("/{prefix}_used"),
            write: format!("/{prefix}_write"),
        })
    }

    /// Semaphore names in creation order.
    pub fn semaphores(&self) -> [&str; 3] {
        [&self.free, &self.used, &self.write]
    }
}

/// Returns `$SHMRING_PREFIX`, or [`DEFAULT_PREFIX`] when unset or empty.
pub fn prefix_from_env() -> String {
    std::env::var(PREFIX_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string())
}
