//! Terminal session glue.
//!
//! Ties the pieces together for a host program: the primary drawing
//! [`Surface`], the fingerprinting engine feeding capability queries, the
//! restore string that must reach the terminal on every exit path, and the
//! rescue helper covering the paths where this process never gets to run
//! its own cleanup.
//!
//! Lifecycle: create the session, launch rescue, then enter raw mode (the
//! guard), then fingerprint. Leaving raw mode, normally or through the
//! guard's drop, always happens before the rescue handle shuts down.

use std::path::Path;

use anyhow::Result;
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::stdout;

use core_probe::{ByteSink, CapabilitySet, DetectState, Fingerprinter, TerminalIdentity};
use core_rescue::Rescue;
use core_surface::Surface;

/// Restore string emitted on orderly shutdown and published to rescue:
/// leave the alternate screen, reset attributes, show the cursor.
pub const DEFAULT_RESTORE: &str = "\u{1b}[?1049l\u{1b}[0m\u{1b}[?25h";

pub struct TerminalSession<S: ByteSink> {
    surface: Surface,
    fingerprinter: Fingerprinter<S>,
    restore: String,
    rescue: Option<Rescue>,
}

impl<S: ByteSink> TerminalSession<S> {
    /// `sink` is where probe bytes (and glitch patches) are written; it is
    /// the host's connection to the terminal.
    pub fn new(sink: S, width: i32, height: i32) -> Self {
        TerminalSession {
            surface: Surface::new(width, height),
            fingerprinter: Fingerprinter::new(sink),
            restore: DEFAULT_RESTORE.to_string(),
            rescue: None,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Launch the rescue helper. Best effort: on failure the session runs
    /// without crash protection.
    pub fn launch_rescue(&mut self, helper: &Path) {
        match Rescue::launch(helper, &self.restore) {
            Ok(mut rescue) => {
                rescue.set_restore_string(&self.restore);
                if let Err(error) = rescue.snapshot_termios() {
                    tracing::debug!(%error, "no termios snapshot for rescue");
                }
                self.rescue = Some(rescue);
            }
            Err(error) => {
                tracing::warn!(%error, "rescue unavailable, continuing without it");
            }
        }
    }

    /// Update the restore string for both the orderly and the crash path.
    pub fn set_restore_string(&mut self, restore: &str) {
        self.restore = restore.to_string();
        if let Some(rescue) = &mut self.rescue {
            rescue.set_restore_string(restore);
        }
    }

    pub fn restore_string(&self) -> &str {
        &self.restore
    }

    // ---- fingerprinting ---------------------------------------------------

    pub fn start_auto_detect(&mut self) {
        self.fingerprinter.start();
    }

    /// Feed terminal input while fingerprinting runs.
    pub fn add_input_data(&mut self, data: &[u8]) {
        self.fingerprinter.add_input_data(data);
    }

    pub fn auto_detect_state(&self) -> DetectState {
        self.fingerprinter.state()
    }

    pub fn identity(&self) -> Option<&TerminalIdentity> {
        self.fingerprinter.identity()
    }

    /// Diagnostic summary, e.g. `Type: xterm(354) safe-CPR seq:>=`.
    pub fn identity_text(&self) -> Option<String> {
        self.identity().map(TerminalIdentity::summary)
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.fingerprinter.capabilities()
    }

    pub fn capable(&self, cap: CapabilitySet) -> bool {
        self.fingerprinter.capabilities().contains(cap)
    }

    pub fn self_reported_name_and_version(&self) -> Option<&str> {
        self.fingerprinter.self_reported_name_and_version()
    }

    pub fn needs_glitch_patching(&self) -> bool {
        self.fingerprinter.needs_glitch_patching()
    }

    /// Orderly shutdown: rescue is told to stand down after the caller has
    /// written the restore string itself.
    pub fn shutdown(mut self) {
        if let Some(rescue) = self.rescue.take() {
            rescue.shutdown();
        }
    }
}

/// Raw-mode scope for hosts that drive the real terminal. Kept separate
/// from [`TerminalSession`] so headless tests never touch process state.
pub struct RawModeScope {
    active: bool,
}

impl RawModeScope {
    pub fn enter() -> Result<RawModeScope> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide)?;
        Ok(RawModeScope { active: true })
    }

    pub fn leave(&mut self) -> Result<()> {
        if self.active {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.active = false;
        }
        Ok(())
    }
}

impl Drop for RawModeScope {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}
