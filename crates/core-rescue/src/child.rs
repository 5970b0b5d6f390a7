//! The helper process proper.
//!
//! Invocation contract (enforced, exit 1 otherwise):
//! - `TTYRESCUE_RESTORE` carries the fallback restore string,
//! - fd 0 is the non-blocking read end of the supervisor pipe (not a tty),
//! - fd 1 is closed,
//! - with `TTYRESCUE_SHMFD` set, fd 3 maps the rescue region; with
//!   `TTYRESCUE_SYSVSHMID` set, that System-V segment is attached instead.
//!
//! After setup the helper blocks every signal and sleeps in `select` on
//! fd 0. One byte means orderly shutdown. EOF without the byte means the
//! parent died: write the active restore string to fd 2 and, if the
//! snapshot is published and the process group still owns the terminal,
//! put the saved termios back. The crash path allocates nothing; it only
//! uses `write`, atomic loads and `tcsetattr`.

use std::os::fd::{FromRawFd, OwnedFd};
use std::sync::atomic::Ordering;

use crate::region::{Mapping, FLAG_ATTACHED, FLAG_TERMIOS_SET, REGION_SIZE};

fn out(msg: &str) {
    // Best effort; the process is about to exit anyway.
    unsafe {
        libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
    }
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

enum Region {
    None,
    Mapped(Mapping),
    SysV(*mut libc::c_void),
}

impl Region {
    fn header(&self) -> Option<&crate::region::RescueRegion> {
        match self {
            Region::None => None,
            Region::Mapped(m) => Some(m.header()),
            Region::SysV(ptr) => {
                Some(unsafe { &*(*ptr as *const crate::region::RescueRegion) })
            }
        }
    }

    fn read_string(&self, offset: i32) -> &[u8] {
        match self {
            Region::None => &[],
            Region::Mapped(m) => m.read_string(offset),
            Region::SysV(ptr) => {
                let offset = offset as usize;
                if offset == 0 || offset >= REGION_SIZE {
                    return &[];
                }
                unsafe {
                    let start = (*ptr as *const u8).add(offset);
                    let mut len = 0;
                    while offset + len < REGION_SIZE && *start.add(len) != 0 {
                        len += 1;
                    }
                    std::slice::from_raw_parts(start, len)
                }
            }
        }
    }
}

/// Run the helper; returns the process exit code.
pub fn run_child() -> i32 {
    let restore = match std::env::var("TTYRESCUE_RESTORE") {
        Ok(v) if !v.is_empty() => v,
        _ => {
            out("This is an internal helper that restores the terminal when its parent dies.\n");
            out("There should be no need to run it manually.\n");
            return 0;
        }
    };

    // fd 0: a non-tty, non-blocking pipe end.
    if unsafe { libc::isatty(0) } != 0
        || !matches!(errno(), libc::EINVAL | libc::ENOTTY | libc::EOPNOTSUPP)
    {
        out("Invalid invocation\n");
        return 1;
    }
    let fl = unsafe { libc::fcntl(0, libc::F_GETFL) };
    if fl == -1 || fl & libc::O_NONBLOCK == 0 {
        out("Invalid invocation\n");
        return 1;
    }
    // fd 1: closed.
    if unsafe { libc::isatty(1) } != 0 || errno() != libc::EBADF {
        out("Invalid invocation\n");
        return 1;
    }

    let mut region = Region::None;
    if std::env::var_os("TTYRESCUE_SHMFD").is_some() {
        let fd = unsafe { OwnedFd::from_raw_fd(3) };
        match Mapping::from_fd(fd) {
            Ok(mapping) => {
                mapping.header().flags.fetch_or(FLAG_ATTACHED, Ordering::AcqRel);
                region = Region::Mapped(mapping);
            }
            Err(_) => {
                out("termrescue: mmap failed. Abort.\n");
                return 1;
            }
        }
    } else if let Ok(id) = std::env::var("TTYRESCUE_SYSVSHMID") {
        let Ok(id) = id.parse::<i32>() else {
            out("termrescue: can't parse TTYRESCUE_SYSVSHMID. Abort.\n");
            return 1;
        };
        let ptr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
        if ptr as isize == -1 {
            out("termrescue: shmat failed. Abort.\n");
            return 1;
        }
        unsafe {
            (*(ptr as *const crate::region::RescueRegion))
                .flags
                .fetch_or(FLAG_ATTACHED, Ordering::AcqRel);
        }
        region = Region::SysV(ptr);
        // Attach handshake: the supervisor waits for one byte.
        unsafe {
            libc::write(0, b"x".as_ptr() as *const libc::c_void, 1);
        }
    }

    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut set);
        libc::sigprocmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }

    loop {
        unsafe {
            let mut rfds: libc::fd_set = std::mem::zeroed();
            let mut efds: libc::fd_set = std::mem::zeroed();
            libc::FD_ZERO(&mut rfds);
            libc::FD_SET(0, &mut rfds);
            libc::FD_ZERO(&mut efds);
            libc::FD_SET(0, &mut efds);
            if libc::select(1, &mut rfds, std::ptr::null_mut(), &mut efds, std::ptr::null_mut())
                < 0
            {
                return 0;
            }
        }
        let mut buf = [0u8; 10];
        let n = unsafe { libc::read(0, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n == 0 {
            // Pipe closed without a sentinel byte: the parent crashed.
            crash_restore(&region, &restore);
            return 0;
        }
        if n < 0 && matches!(errno(), libc::EAGAIN | libc::EWOULDBLOCK) {
            continue;
        }
        // Sentinel byte (or a hard error): orderly shutdown.
        return 0;
    }
}

/// Async-signal-safe tail: restore string to fd 2, then termios.
fn crash_restore(region: &Region, fallback: &str) {
    let offset = region
        .header()
        .map(|h| h.active.load(Ordering::Acquire))
        .unwrap_or(0);
    let bytes = if offset != 0 {
        region.read_string(offset)
    } else {
        fallback.as_bytes()
    };
    unsafe {
        libc::write(2, bytes.as_ptr() as *const libc::c_void, bytes.len());
    }

    let Some(header) = region.header() else {
        return;
    };
    if header.flags.load(Ordering::Acquire) & FLAG_TERMIOS_SET == 0 {
        return;
    }
    unsafe {
        if libc::tcgetpgrp(2) != libc::getpgrp() {
            return;
        }
        let mut attr: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(2, &mut attr) < 0 {
            return;
        }
        attr.c_iflag = header.termios_iflag.load(Ordering::Relaxed) as libc::tcflag_t;
        attr.c_oflag = header.termios_oflag.load(Ordering::Relaxed) as libc::tcflag_t;
        attr.c_lflag = header.termios_lflag.load(Ordering::Relaxed) as libc::tcflag_t;
        attr.c_cc[libc::VINTR] = header.termios_vintr.load(Ordering::Relaxed) as libc::cc_t;
        attr.c_cc[libc::VMIN] = header.termios_vmin.load(Ordering::Relaxed) as libc::cc_t;
        attr.c_cc[libc::VQUIT] = header.termios_vquit.load(Ordering::Relaxed) as libc::cc_t;
        attr.c_cc[libc::VSTART] = header.termios_vstart.load(Ordering::Relaxed) as libc::cc_t;
        attr.c_cc[libc::VSTOP] = header.termios_vstop.load(Ordering::Relaxed) as libc::cc_t;
        attr.c_cc[libc::VSUSP] = header.termios_vsusp.load(Ordering::Relaxed) as libc::cc_t;
        attr.c_cc[libc::VTIME] = header.termios_vtime.load(Ordering::Relaxed) as libc::cc_t;
        libc::tcsetattr(2, libc::TCSAFLUSH, &attr);
    }
}
