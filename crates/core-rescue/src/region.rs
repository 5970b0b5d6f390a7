//! The shared rescue region.
//!
//! Fixed-size anonymous shared mapping, inherited by the helper through
//! fd 3 (or a System-V shm id). The header holds two atomics plus the
//! termios snapshot; the rest of the region stores two alternating
//! null-terminated restore-string slots. `active` is the byte offset of the
//! current string (0 = none); writes to a slot always go to the inactive
//! one, so the helper can read whatever `active` points at without any
//! locking. The termios fields become meaningful once `FLAG_TERMIOS_SET`
//! is observed; the flag's release/acquire pair orders the plain snapshot
//! stores before the helper's reads.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, AtomicI64};

/// Total size of the shared mapping.
pub const REGION_SIZE: usize = 8048;

/// The helper attached to the region.
pub const FLAG_ATTACHED: i32 = 1 << 0;
/// The termios snapshot fields are valid.
pub const FLAG_TERMIOS_SET: i32 = 1 << 1;

#[repr(C)]
pub struct RescueRegion {
    /// Byte offset of the active restore string, 0 when none is published.
    pub active: AtomicI32,
    pub flags: AtomicI32,
    pub termios_iflag: AtomicI64,
    pub termios_oflag: AtomicI64,
    pub termios_lflag: AtomicI64,
    pub termios_vintr: AtomicI64,
    pub termios_vmin: AtomicI64,
    pub termios_vquit: AtomicI64,
    pub termios_vstart: AtomicI64,
    pub termios_vstop: AtomicI64,
    pub termios_vsusp: AtomicI64,
    pub termios_vtime: AtomicI64,
}

const HEADER_SIZE: usize = std::mem::size_of::<RescueRegion>();
const SLOT_COUNT: usize = 2;

/// Byte capacity of one restore-string slot (including the terminator).
pub fn slot_capacity() -> usize {
    (REGION_SIZE - HEADER_SIZE) / SLOT_COUNT
}

/// Byte offset of a slot inside the region.
pub fn slot_offset(slot: usize) -> usize {
    HEADER_SIZE + slot * slot_capacity()
}

/// Owned mapping of a rescue region backed by an inheritable fd.
pub struct Mapping {
    fd: OwnedFd,
    ptr: *mut u8,
}

// The mapping is plain shared memory with atomic headers; the raw pointer
// does not tie it to a thread.
unsafe impl Send for Mapping {}

impl Mapping {
    /// Create a new zeroed region on an anonymous shared fd.
    pub fn create() -> io::Result<Mapping> {
        let fd = anon_shm_fd()?;
        if unsafe { libc::ftruncate(fd.as_raw_fd(), REGION_SIZE as libc::off_t) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Self::from_fd(fd)
    }

    /// Map an existing region fd (the helper's fd 3 path).
    pub fn from_fd(fd: OwnedFd) -> io::Result<Mapping> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                REGION_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Mapping {
            fd,
            ptr: ptr as *mut u8,
        })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn header(&self) -> &RescueRegion {
        // The mapping is at least REGION_SIZE bytes, zero-initialized, and
        // the header is all atomics, so shared access is sound.
        unsafe { &*(self.ptr as *const RescueRegion) }
    }

    /// Store `text` (null-terminated) into `slot` and return its offset,
    /// truncating to the slot capacity. The caller publishes the offset via
    /// `header().active` when ready.
    pub fn write_restore(&self, slot: usize, text: &str) -> i32 {
        let cap = slot_capacity();
        let offset = slot_offset(slot % SLOT_COUNT);
        let bytes = text.as_bytes();
        let len = bytes.len().min(cap - 1);
        unsafe {
            let dst = self.ptr.add(offset);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, len);
            *dst.add(len) = 0;
        }
        offset as i32
    }

    /// Read the null-terminated string at `offset` (helper side).
    pub fn read_string(&self, offset: i32) -> &[u8] {
        let offset = offset as usize;
        if offset == 0 || offset >= REGION_SIZE {
            return &[];
        }
        unsafe {
            let start = self.ptr.add(offset);
            let mut len = 0;
            while offset + len < REGION_SIZE && *start.add(len) != 0 {
                len += 1;
            }
            std::slice::from_raw_parts(start, len)
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, REGION_SIZE);
        }
    }
}

#[cfg(target_os = "linux")]
fn anon_shm_fd() -> io::Result<OwnedFd> {
    let name = b"termrescue\0";
    let fd = unsafe { libc::memfd_create(name.as_ptr() as *const libc::c_char, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

#[cfg(not(target_os = "linux"))]
fn anon_shm_fd() -> io::Result<OwnedFd> {
    // No memfd: an unlinked temporary file gives the same inheritable fd.
    let file = tempfile_in_tmp()?;
    Ok(OwnedFd::from(file))
}

#[cfg(not(target_os = "linux"))]
fn tempfile_in_tmp() -> io::Result<std::fs::File> {
    let mut template = b"/tmp/termrescue.XXXXXX\0".to_vec();
    let fd = unsafe { libc::mkstemp(template.as_mut_ptr() as *mut libc::c_char) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    unsafe {
        libc::unlink(template.as_ptr() as *const libc::c_char);
        Ok(std::fs::File::from_raw_fd(fd))
    }
}
