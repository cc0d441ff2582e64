//! Shared memory segment (`shm_open(3)` + `mmap(2)`) holding the ring state.

use crate::error::Resource;
use crate::RingError;
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use tracing::warn;

/// Magic bytes "SHMRING1" for layout validation
pub(crate) const MAGIC: u64 = 0x5348_4d52_494e_4731;
/// Segment format version (increment on breaking changes)
pub(crate) const VERSION: u32 = 1;

/// Header at offset 0 of the segment.
///
/// Every mutable field has exactly one writer role:
/// - `write_pos`, `published`, `writer_pid`: the producer holding the write mutex
/// - `read_pos`, `shutdown`: the supervisor
/// - `attached`: each producer for its own registration
///
/// `magic` is stored last with Release so attachers never see a half
/// initialized header.
#[repr(C, align(64))]
pub(crate) struct SegmentHeader {
    pub magic: AtomicU64,
    pub version: u32,
    pub capacity: u32,
    pub slot_size: u32,
    pub max_producers: u32,
    pub shutdown: AtomicBool,
    pub attached: AtomicU32,
    pub writer_pid: AtomicI32,
    pub write_pos: AtomicU32,
    pub read_pos: AtomicU32,
    pub published: AtomicU64,
}

/// Sizes needed to create or validate a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentLayout {
    pub capacity: usize,
    pub slot_size: usize,
    pub slot_align: usize,
    pub max_producers: usize,
}

impl SegmentLayout {
    pub fn for_slots<T>(capacity: usize, max_producers: usize) -> Self {
        Self {
            capacity,
            slot_size: mem::size_of::<T>(),
            slot_align: mem::align_of::<T>(),
            max_producers,
        }
    }

    /// Offset of slot 0: the header rounded up to the slot alignment.
    pub fn slots_offset(&self) -> usize {
        let align = self.slot_align.max(1);
        mem::size_of::<SegmentHeader>().div_ceil(align) * align
    }

    pub fn total_len(&self) -> Option<usize> {
        self.capacity
            .checked_mul(self.slot_size)?
            .checked_add(self.slots_offset())
    }
}

/// A mapped shared memory object.
///
/// The creating side unlinks the name on drop; attached sides only unmap.
#[derive(Debug)]
pub(crate) struct SharedSegment {
    name: String,
    base: NonNull<u8>,
    len: usize,
    slots_offset: usize,
    owner: bool,
    _fd: OwnedFd,
}

// Safety: all cross-process access goes through atomics in the header or
// through slots handed over by the semaphore protocol.
unsafe impl Send for SharedSegment {}
unsafe impl Sync for SharedSegment {}

fn c_name(name: &str) -> Result<CString, RingError> {
    CString::new(name)
        .map_err(|_| RingError::InvalidConfig(format!("segment name `{name}` contains NUL")))
}

impl SharedSegment {
    /// Creates, sizes, maps and initializes a new segment.
    pub fn create(name: &str, layout: &SegmentLayout) -> Result<Self, RingError> {
        let c = c_name(name)?;
        let len = layout.total_len().ok_or_else(|| {
            RingError::InvalidConfig(format!("segment `{name}` size overflows usize"))
        })?;
        let header_fields = [layout.capacity, layout.slot_size, layout.max_producers];
        if header_fields.iter().any(|&v| v > u32::MAX as usize) {
            return Err(RingError::InvalidConfig(format!(
                "segment `{name}` parameters exceed the header range"
            )));
        }

        // SAFETY: `c` is a valid NUL-terminated string.
        let raw = unsafe {
            libc::shm_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if raw < 0 {
            return Err(RingError::from_open(
                Resource::Segment,
                name,
                io::Error::last_os_error(),
                true,
            ));
        }
        // SAFETY: `raw` is a freshly opened descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let create_error = |source: io::Error| {
            // SAFETY: `c` is a valid NUL-terminated string.
            unsafe { libc::shm_unlink(c.as_ptr()) };
            RingError::Create {
                resource: Resource::Segment,
                name: name.to_string(),
                source,
            }
        };

        // SAFETY: `fd` is a valid shared memory descriptor.
        if unsafe { libc::ftruncate(fd.as_raw_fd(), len as libc::off_t) } != 0 {
            return Err(create_error(io::Error::last_os_error()));
        }
        let base = map(&fd, len).map_err(create_error)?;

        // ftruncate zero-fills, so every atomic already reads 0/false.
        let header = base.as_ptr().cast::<SegmentHeader>();
        // SAFETY: the mapping is at least header-sized, page aligned, and no
        // other process can validate it before `magic` is published.
        unsafe {
            ptr::addr_of_mut!((*header).version).write(VERSION);
            ptr::addr_of_mut!((*header).capacity).write(layout.capacity as u32);
            ptr::addr_of_mut!((*header).slot_size).write(layout.slot_size as u32);
            ptr::addr_of_mut!((*header).max_producers).write(layout.max_producers as u32);
            (*header).magic.store(MAGIC, Ordering::Release);
        }

        Ok(Self {
            name: name.to_string(),
            base,
            len,
            slots_offset: layout.slots_offset(),
            owner: true,
            _fd: fd,
        })
    }

    /// Maps an existing segment and checks it was created for slots of
    /// `slot_size` bytes aligned to `slot_align`.
    pub fn attach(name: &str, slot_size: usize, slot_align: usize) -> Result<Self, RingError> {
        let c = c_name(name)?;
        // SAFETY: `c` is a valid NUL-terminated string.
        let raw = unsafe { libc::shm_open(c.as_ptr(), libc::O_RDWR, 0) };
        if raw < 0 {
            return Err(RingError::from_open(
                Resource::Segment,
                name,
                io::Error::last_os_error(),
                false,
            ));
        }
        // SAFETY: `raw` is a freshly opened descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let attach_error = |source: io::Error| RingError::Attach {
            resource: Resource::Segment,
            name: name.to_string(),
            source,
        };
        let layout_error = |reason: String| RingError::Layout {
            name: name.to_string(),
            reason,
        };

        let len = segment_len(&fd).map_err(attach_error)?;
        if len < mem::size_of::<SegmentHeader>() {
            return Err(layout_error("segment is not initialized yet".into()));
        }
        let base = map(&fd, len).map_err(attach_error)?;

        // Build the handle first so every early return unmaps.
        let mut segment = Self {
            name: name.to_string(),
            base,
            len,
            slots_offset: 0,
            owner: false,
            _fd: fd,
        };

        let header = segment.header();
        if header.magic.load(Ordering::Acquire) != MAGIC {
            return Err(layout_error("bad magic; segment not created by shmring".into()));
        }
        if header.version != VERSION {
            return Err(layout_error(format!(
                "version mismatch: expected {}, got {}",
                VERSION, header.version
            )));
        }
        if header.slot_size as usize != slot_size {
            return Err(layout_error(format!(
                "slot size mismatch: segment has {}, expected {}",
                header.slot_size, slot_size
            )));
        }
        if header.capacity == 0 || header.max_producers == 0 {
            return Err(layout_error("zero capacity or producer limit".into()));
        }

        let layout = SegmentLayout {
            capacity: header.capacity as usize,
            slot_size,
            slot_align,
            max_producers: header.max_producers as usize,
        };
        match layout.total_len() {
            Some(needed) if needed <= len => {}
            _ => {
                return Err(layout_error(format!(
                    "segment is {len} bytes, too small for {} slots",
                    layout.capacity
                )))
            }
        }

        segment.slots_offset = layout.slots_offset();
        Ok(segment)
    }

    #[inline]
    pub fn header(&self) -> &SegmentHeader {
        // SAFETY: the mapping is header-sized and page aligned for its whole
        // lifetime; all mutable fields are atomics.
        unsafe { &*self.base.as_ptr().cast::<SegmentHeader>() }
    }

    /// Pointer to slot `index` reinterpreted as `T`.
    ///
    /// # Safety
    ///
    /// `index < capacity` and `T` must be the type the segment was validated for.
    #[inline]
    pub unsafe fn slot<T>(&self, index: usize) -> *mut T {
        self.base
            .as_ptr()
            .add(self.slots_offset)
            .cast::<T>()
            .add(index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapped_len(&self) -> usize {
        self.len
    }

    /// Removes a segment name from the system.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: `c` is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(c.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` describe the mapping created in create/attach.
        if unsafe { libc::munmap(self.base.as_ptr().cast(), self.len) } != 0 {
            warn!(segment = %self.name, error = %io::Error::last_os_error(), "munmap failed");
        }
        if self.owner {
            if let Err(err) = Self::unlink(&self.name) {
                warn!(segment = %self.name, error = %err, "shm_unlink failed");
            }
        }
    }
}

fn segment_len(fd: &OwnedFd) -> io::Result<usize> {
    // SAFETY: `stat` is plain data; fstat fills it on success.
    let mut stat: libc::stat = unsafe { mem::zeroed() };
    if unsafe { libc::fstat(fd.as_raw_fd(), &mut stat) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat.st_size as usize)
}

fn map(fd: &OwnedFd, len: usize) -> io::Result<NonNull<u8>> {
    // SAFETY: mapping a shared memory descriptor we hold open.
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd.as_raw_fd(),
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))
}
