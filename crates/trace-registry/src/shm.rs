//! Named shared-memory segments for cross-process attach.
//!
//! An in-process-only ring/lane pool has no cross-process analogue; grounded
//! on `spec.md` §6's four named segments (`control`, `index`, `detail`,
//! `registry`) and on this crate's own Open-Question resolution for the
//! naming scheme: `ada.{role}.{pid}.{session_id}`.

use std::ffi::CString;
use std::fs::File;
use std::os::unix::io::FromRawFd;

use memmap2::MmapMut;
use thiserror::Error;

/// Roles a shared-memory segment can serve, used as the `{role}` component
/// of the `ada.{role}.{pid}.{session_id}` naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    Control,
    Index,
    Detail,
    Registry,
}

impl SegmentRole {
    fn as_str(self) -> &'static str {
        match self {
            SegmentRole::Control => "control",
            SegmentRole::Index => "index",
            SegmentRole::Detail => "detail",
            SegmentRole::Registry => "registry",
        }
    }
}

/// Errors from creating or attaching a shared-memory segment.
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shm_open failed for {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ftruncate failed for {name}: {source}")]
    Truncate {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mmap failed for {name}: {source}")]
    Map {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("segment name contains an interior nul byte")]
    InvalidName,
}

/// Builds the `ada.{role}.{pid}.{session_id}` segment name.
pub fn segment_name(role: SegmentRole, pid: u32, session_id: u64) -> String {
    format!("/ada.{}.{}.{}", role.as_str(), pid, session_id)
}

/// Size in bytes of the `registry` segment for `capacity` threads: a
/// 64-byte header plus one 128-byte-aligned slot per thread, matching
/// `ThreadRegistry`'s own layout contract. The registry itself stays a
/// heap-allocated, in-process arena (cross-process registry mapping stays
/// out of scope); this sizing exists so a `registry` segment can be created
/// for attach-side consumers that only need the footprint, not the live
/// arena.
pub const REGISTRY_HEADER_BYTES: usize = 64;
pub const REGISTRY_SLOT_BYTES: usize = 128;

pub fn calculate_memory_size_with_capacity(capacity: usize) -> usize {
    REGISTRY_HEADER_BYTES + capacity * REGISTRY_SLOT_BYTES
}

/// A shared-memory segment, mapped read-write into this process.
pub struct Segment {
    name: String,
    mmap: MmapMut,
}

impl Segment {
    /// Creates a new segment of `size` bytes, or truncates/remaps an
    /// existing one of the same name.
    pub fn create(name: &str, size: usize) -> Result<Self, ShmError> {
        Self::open(name, size, libc::O_CREAT | libc::O_RDWR)
    }

    /// Attaches to an existing segment. Fails if the segment does not
    /// already exist.
    pub fn attach(name: &str, size: usize) -> Result<Self, ShmError> {
        Self::open(name, size, libc::O_RDWR)
    }

    fn open(name: &str, size: usize, flags: i32) -> Result<Self, ShmError> {
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName)?;

        // SAFETY: c_name is a valid nul-terminated C string for the
        // duration of this call; shm_open's return value is checked below.
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, 0o600) };
        if fd < 0 {
            return Err(ShmError::Open {
                name: name.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }

        // SAFETY: fd is a valid, just-opened file descriptor we uniquely own.
        let file = unsafe { File::from_raw_fd(fd) };

        if flags & libc::O_CREAT != 0 {
            file.set_len(size as u64).map_err(|source| ShmError::Truncate {
                name: name.to_string(),
                source,
            })?;
        }

        // SAFETY: the file descriptor refers to shared memory sized above;
        // no other mapping of this region is held by this process.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| ShmError::Map {
            name: name.to_string(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            mmap,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Unlinks a segment by name, releasing its backing storage once every
    /// process holding it has unmapped it. Idempotent: unlinking a
    /// nonexistent segment is not an error.
    pub fn unlink(name: &str) -> Result<(), ShmError> {
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName)?;
        // SAFETY: c_name is a valid nul-terminated C string for this call.
        let rc = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::NotFound {
                return Err(ShmError::Open {
                    name: name.to_string(),
                    source: err,
                });
            }
        }
        Ok(())
    }
}
