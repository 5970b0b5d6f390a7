//! Parent-side rescue control.
//!
//! [`Rescue::launch`] creates the shared region, spawns the helper with the
//! region on fd 3 and the pipe read end on fd 0, and returns a handle the
//! host updates as its restore string evolves. Dropping the handle performs
//! the orderly shutdown (sentinel byte, close, reap).

use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::Ordering;

use thiserror::Error;

use crate::region::{Mapping, FLAG_TERMIOS_SET};

#[derive(Debug, Error)]
pub enum RescueError {
    #[error("rescue region setup failed: {0}")]
    Region(#[source] std::io::Error),
    #[error("rescue pipe setup failed: {0}")]
    Pipe(#[source] std::io::Error),
    #[error("rescue helper spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("terminal attributes unavailable: {0}")]
    Termios(#[source] std::io::Error),
}

pub struct Rescue {
    mapping: Mapping,
    pipe: Option<std::fs::File>,
    child: Child,
    next_slot: usize,
}

impl Rescue {
    /// Spawn the helper binary at `helper` with `fallback_restore` as the
    /// environment-provided restore string.
    pub fn launch(helper: &Path, fallback_restore: &str) -> Result<Rescue, RescueError> {
        let mapping = Mapping::create().map_err(RescueError::Region)?;
        let (read_end, write_end) = pipe_nonblocking_read().map_err(RescueError::Pipe)?;

        let shm_fd = mapping.raw_fd();
        let mut command = Command::new(helper);
        command
            .env("TTYRESCUE_RESTORE", fallback_restore)
            .env("TTYRESCUE_SHMFD", "1")
            .stdin(Stdio::from(read_end))
            .stderr(Stdio::inherit());
        unsafe {
            command.pre_exec(move || {
                // The helper insists on fd 1 being closed and finds the
                // region on fd 3.
                libc::close(1);
                install_region_fd(shm_fd)
            });
        }
        let child = command.spawn().map_err(RescueError::Spawn)?;
        tracing::debug!(pid = child.id(), "rescue helper launched");

        Ok(Rescue {
            mapping,
            pipe: Some(std::fs::File::from(write_end)),
            child,
            next_slot: 0,
        })
    }

    /// Publish a new restore string. The previous one stays valid until the
    /// new offset is visible, so the helper never reads a torn string.
    pub fn set_restore_string(&mut self, restore: &str) {
        let offset = self.mapping.write_restore(self.next_slot, restore);
        self.next_slot = (self.next_slot + 1) % 2;
        self.mapping.header().active.store(offset, Ordering::Release);
    }

    /// Snapshot the controlling terminal's termios into the region and mark
    /// it valid for the crash path.
    pub fn snapshot_termios(&mut self) -> Result<(), RescueError> {
        let mut attr: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(2, &mut attr) } < 0 {
            return Err(RescueError::Termios(std::io::Error::last_os_error()));
        }
        let h = self.mapping.header();
        h.termios_iflag.store(attr.c_iflag as i64, Ordering::Relaxed);
        h.termios_oflag.store(attr.c_oflag as i64, Ordering::Relaxed);
        h.termios_lflag.store(attr.c_lflag as i64, Ordering::Relaxed);
        h.termios_vintr
            .store(attr.c_cc[libc::VINTR] as i64, Ordering::Relaxed);
        h.termios_vmin
            .store(attr.c_cc[libc::VMIN] as i64, Ordering::Relaxed);
        h.termios_vquit
            .store(attr.c_cc[libc::VQUIT] as i64, Ordering::Relaxed);
        h.termios_vstart
            .store(attr.c_cc[libc::VSTART] as i64, Ordering::Relaxed);
        h.termios_vstop
            .store(attr.c_cc[libc::VSTOP] as i64, Ordering::Relaxed);
        h.termios_vsusp
            .store(attr.c_cc[libc::VSUSP] as i64, Ordering::Relaxed);
        h.termios_vtime
            .store(attr.c_cc[libc::VTIME] as i64, Ordering::Relaxed);
        h.flags.fetch_or(FLAG_TERMIOS_SET, Ordering::AcqRel);
        Ok(())
    }

    /// Orderly shutdown: sentinel byte, close the pipe, reap the helper.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(mut pipe) = self.pipe.take() {
            let _ = pipe.write_all(b"x");
            drop(pipe);
            let _ = self.child.wait();
            tracing::debug!("rescue helper shut down");
        }
    }
}

impl Drop for Rescue {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

/// Make `shm_fd` appear as fd 3 in the child. `dup2` clears close-on-exec
/// on the duplicate; when the fd already is 3 the flag is cleared by hand.
fn install_region_fd(shm_fd: i32) -> std::io::Result<()> {
    unsafe {
        if shm_fd == 3 {
            let flags = libc::fcntl(3, libc::F_GETFD);
            if flags < 0 || libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                return Err(std::io::Error::last_os_error());
            }
        } else if libc::dup2(shm_fd, 3) < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn pipe_nonblocking_read() -> std::io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    let fl = unsafe { libc::fcntl(read_end.as_raw_fd(), libc::F_GETFL) };
    if fl < 0
        || unsafe { libc::fcntl(read_end.as_raw_fd(), libc::F_SETFL, fl | libc::O_NONBLOCK) } < 0
    {
        return Err(std::io::Error::last_os_error());
    }
    Ok((read_end, write_end))
}
