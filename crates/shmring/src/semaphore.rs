//! POSIX named semaphores (`sem_open(3)`).

use crate::error::Resource;
use crate::RingError;
use std::ffi::CString;
use std::io;
use std::time::Duration;
use tracing::warn;

/// Result of a blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A token was taken.
    Acquired,
    /// A signal handler ran before a token became available (`EINTR`).
    Interrupted,
    /// The timeout elapsed.
    TimedOut,
}

/// A counting semaphore shared between processes by name.
///
/// The creating side unlinks the name on drop; the opening side only closes
/// its handle.
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
    owner: bool,
}

// Safety: POSIX semaphores are safe to use from any thread; the handle is
// only closed in Drop.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> Result<CString, RingError> {
    CString::new(name)
        .map_err(|_| RingError::InvalidConfig(format!("semaphore name `{name}` contains NUL")))
}

impl NamedSemaphore {
    /// Creates a new semaphore, failing if the name is already taken.
    pub fn create(name: &str, initial: u32) -> Result<Self, RingError> {
        let c = c_name(name)?;
        // SAFETY: `c` is a valid NUL-terminated string; mode and value are
        // passed as `c_uint` as required for the variadic arguments.
        let sem = unsafe {
            libc::sem_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(RingError::from_open(
                Resource::Semaphore,
                name,
                io::Error::last_os_error(),
                true,
            ));
        }
        Ok(Self {
            sem,
            name: name.to_string(),
            owner: true,
        })
    }

    /// Opens a semaphore created by another process.
    pub fn open(name: &str) -> Result<Self, RingError> {
        let c = c_name(name)?;
        // SAFETY: `c` is a valid NUL-terminated string.
        let sem = unsafe { libc::sem_open(c.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(RingError::from_open(
                Resource::Semaphore,
                name,
                io::Error::last_os_error(),
                false,
            ));
        }
        Ok(Self {
            sem,
            name: name.to_string(),
            owner: false,
        })
    }

    /// Blocks until a token is available or a signal interrupts the wait.
    pub fn wait(&self) -> Result<WaitOutcome, RingError> {
        // SAFETY: `self.sem` stays valid until Drop.
        if unsafe { libc::sem_wait(self.sem) } == 0 {
            return Ok(WaitOutcome::Acquired);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => Ok(WaitOutcome::Interrupted),
            _ => Err(self.wait_error(err)),
        }
    }

    /// Takes a token if one is available right now.
    pub fn try_wait(&self) -> Result<bool, RingError> {
        // SAFETY: `self.sem` stays valid until Drop.
        if unsafe { libc::sem_trywait(self.sem) } == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN | libc::EINTR) => Ok(false),
            _ => Err(self.wait_error(err)),
        }
    }

    /// Blocks for at most `timeout`.
    #[cfg(target_os = "linux")]
    pub fn wait_timeout(&self, timeout: Duration) -> Result<WaitOutcome, RingError> {
        let deadline = realtime_deadline(timeout).map_err(|err| self.wait_error(err))?;
        // SAFETY: `self.sem` stays valid until Drop, `deadline` is a valid timespec.
        if unsafe { libc::sem_timedwait(self.sem, &deadline) } == 0 {
            return Ok(WaitOutcome::Acquired);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => Ok(WaitOutcome::Interrupted),
            Some(libc::ETIMEDOUT) => Ok(WaitOutcome::TimedOut),
            _ => Err(self.wait_error(err)),
        }
    }

    /// Blocks for at most `timeout` (polling; `sem_timedwait` is Linux-only).
    #[cfg(not(target_os = "linux"))]
    pub fn wait_timeout(&self, timeout: Duration) -> Result<WaitOutcome, RingError> {
        let deadline = std::time::Instant::now() + timeout;
        let mut backoff = crate::Backoff::new();
        let mut result = Ok(false);
        backoff.wait_until(deadline, || {
            result = self.try_wait();
            !matches!(result, Ok(false))
        });
        match result? {
            true => Ok(WaitOutcome::Acquired),
            false => Ok(WaitOutcome::TimedOut),
        }
    }

    /// Releases one token.
    pub fn post(&self) -> Result<(), RingError> {
        // SAFETY: `self.sem` stays valid until Drop.
        if unsafe { libc::sem_post(self.sem) } == 0 {
            Ok(())
        } else {
            Err(RingError::Post {
                name: self.name.clone(),
                source: io::Error::last_os_error(),
            })
        }
    }

    /// Current token count.
    pub fn value(&self) -> Result<usize, RingError> {
        let mut value: libc::c_int = 0;
        // SAFETY: `self.sem` stays valid until Drop.
        if unsafe { libc::sem_getvalue(self.sem, &mut value) } != 0 {
            return Err(self.wait_error(io::Error::last_os_error()));
        }
        // Linux reports 0 while waiters are blocked; other systems may report -waiters.
        Ok(value.max(0) as usize)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Removes a semaphore name from the system.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: `c` is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn wait_error(&self, source: io::Error) -> RingError {
        RingError::Wait {
            name: self.name.clone(),
            source,
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful sem_open and is closed once.
        if unsafe { libc::sem_close(self.sem) } != 0 {
            warn!(semaphore = %self.name, error = %io::Error::last_os_error(), "sem_close failed");
        }
        if self.owner {
            if let Err(err) = Self::unlink(&self.name) {
                warn!(semaphore = %self.name, error = %err, "sem_unlink failed");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn realtime_deadline(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `now` is a valid out-pointer.
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let nanos = now.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
    let secs = (now.tv_sec as u64)
        .saturating_add(timeout.as_secs())
        .saturating_add(nanos / 1_000_000_000);
    Ok(libc::timespec {
        tv_sec: secs.min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: (nanos % 1_000_000_000) as _,
    })
}
