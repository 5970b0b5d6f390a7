//! Cell storage.
//!
//! One cell per column per row. Short clusters live inline in the cell;
//! anything longer than [`INLINE_CAP`] bytes is interned in the surface's
//! cluster pool. The right half of a double-width pair is a `WideRight`
//! continuation; it carries the pair's attributes but no text of its own.

use crate::color::Color;
use crate::intern::Handle;
use crate::style::Style;

/// Longest cluster stored inline, in bytes.
pub(crate) const INLINE_CAP: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Glyph {
    /// Cleared cell; reads back as the erased sentinel.
    Erased,
    /// Continuation half of a double-width pair.
    WideRight,
    /// Cluster of up to `INLINE_CAP` bytes stored in place.
    Inline { len: u8, bytes: [u8; INLINE_CAP] },
    /// Longer cluster held by the surface's intern pool.
    Interned(Handle),
}

impl Glyph {
    /// Inline representation when the cluster fits.
    pub(crate) fn inline(text: &str) -> Option<Glyph> {
        if text.len() > INLINE_CAP {
            return None;
        }
        let mut bytes = [0u8; INLINE_CAP];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Some(Glyph::Inline {
            len: text.len() as u8,
            bytes,
        })
    }

    pub(crate) const SPACE: Glyph = Glyph::Inline {
        len: 1,
        bytes: [b' ', 0, 0, 0, 0, 0, 0, 0],
    };
}

#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub glyph: Glyph,
    pub fg: Color,
    pub bg: Color,
    pub deco: Color,
    pub style: Style,
    pub patch: Option<Handle>,
    pub soft_wrap: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            glyph: Glyph::Erased,
            fg: Color::Default,
            bg: Color::Default,
            deco: Color::Default,
            style: Style::empty(),
            patch: None,
            soft_wrap: false,
        }
    }
}

impl Cell {
    pub(crate) fn is_wide_right(&self) -> bool {
        matches!(self.glyph, Glyph::WideRight)
    }

    /// The residue left behind when this cell's pair is split: a space that
    /// keeps the cell's colors and styling.
    pub(crate) fn vanish_residue(&self) -> Cell {
        Cell {
            glyph: Glyph::SPACE,
            ..self.clone()
        }
    }
}
