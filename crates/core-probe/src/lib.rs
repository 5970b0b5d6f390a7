//! Terminal-response fingerprinting.
//!
//! Given an unknown terminal, the [`Fingerprinter`] emits a fixed probe
//! sequence through the caller's byte sink, consumes whatever the terminal
//! sends back (interleaved with unrelated input), and derives:
//!
//! - a [`TerminalIdentity`] (class, canonical sub-version, safe-CPR flag and
//!   the `>` / `=` sequence-support bits),
//! - a [`CapabilitySet`] gating later escape generation,
//! - whether probe fragments leaked onto the screen and were patched over
//!   ("glitch patching").
//!
//! Probing is adaptive: once a terminal family is recognized as misparsing a
//! class of sequences, the probes known to glitch it are skipped. Between a
//! probe and the next one the engine inserts a synchronizing cursor-position
//! query; position drift at such a fence is junk echoed by the probe before
//! it, and the engine overwrites exactly those columns with spaces.
//!
//! The engine never blocks and never writes diagnostics to the output sink;
//! everything diagnostic goes through `tracing`.

pub mod caps;
pub mod engine;
pub mod identity;
pub mod tokens;

pub use caps::CapabilitySet;
pub use engine::{ByteSink, DetectState, Fingerprinter};
pub use identity::{TerminalIdentity, TerminalKind};
