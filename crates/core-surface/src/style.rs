//! Text style bits.

use bitflags::bitflags;

bitflags! {
    /// Per-cell style attributes.
    ///
    /// The three underline variants are mutually exclusive on a cell; when a
    /// caller requests several at once the precedence single > double > curly
    /// applies. Resolution happens when an attribute bundle is written to a
    /// cell, not when the bits are set, so unset/reset keep working on the
    /// raw bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Style: u16 {
        const BOLD            = 1 << 0;
        const ITALIC          = 1 << 1;
        const BLINK           = 1 << 2;
        const OVERLINE        = 1 << 3;
        const INVERSE         = 1 << 4;
        const STRIKE          = 1 << 5;
        const UNDERLINE       = 1 << 6;
        const UNDERLINE_DBL   = 1 << 7;
        const UNDERLINE_CURLY = 1 << 8;
    }
}

impl Style {
    /// Collapse conflicting underline requests: single > double > curly.
    pub fn resolve_underlines(self) -> Style {
        if self.contains(Style::UNDERLINE) {
            self - (Style::UNDERLINE_DBL | Style::UNDERLINE_CURLY)
        } else if self.contains(Style::UNDERLINE_DBL) {
            self - Style::UNDERLINE_CURLY
        } else {
            self
        }
    }
}
