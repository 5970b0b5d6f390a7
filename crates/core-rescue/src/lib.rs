//! Terminal rescue co-process.
//!
//! Before raw mode is entered, the host launches a small detached helper
//! that shares an 8 KiB memory region and the read end of a pipe. The
//! parent keeps the current terminal-restore string and a termios snapshot
//! published in the region; the helper sits in a signal-masked `select` on
//! the pipe. An orderly shutdown writes one sentinel byte before closing;
//! a crash (segfault, SIGKILL, untrapped signal) closes the pipe without
//! it, and the helper writes the published restore string to fd 2 and puts
//! the saved termios back if the process group still owns the terminal.
//!
//! Rescue is strictly best-effort: if the region cannot be created or the
//! helper cannot be spawned the host runs without it.

pub mod child;
pub mod region;
pub mod supervisor;

pub use region::{Mapping, RescueRegion, FLAG_ATTACHED, FLAG_TERMIOS_SET, REGION_SIZE};
pub use supervisor::{Rescue, RescueError};
