//! Attribute bundles: the colors, style and patch a write applies.

use crate::color::Color;
use crate::style::Style;

/// A passthrough escape pair wrapping a run of cells.
///
/// `setup` is emitted before the run, `cleanup` after it. `optimize` allows
/// the renderer to merge adjacent runs carrying the same patch. The typical
/// use is OSC 8 hyperlinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub optimize: bool,
    pub setup: String,
    pub cleanup: String,
}

/// An owned, clonable bundle of everything a write stamps onto cells.
#[derive(Debug, Clone, Default)]
pub struct Attr {
    fg: Color,
    bg: Color,
    deco: Color,
    style: Style,
    patch: Option<Patch>,
}

impl Attr {
    pub fn new(fg: Color, bg: Color) -> Self {
        Attr {
            fg,
            bg,
            ..Attr::default()
        }
    }

    pub fn fg(&self) -> Color {
        self.fg
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    pub fn deco(&self) -> Color {
        self.deco
    }

    /// Raw style bits as set; underline conflicts resolve at write time.
    pub fn style(&self) -> Style {
        self.style
    }

    pub fn patch(&self) -> Option<&Patch> {
        self.patch.as_ref()
    }

    pub fn set_fg(&mut self, fg: Color) {
        self.fg = fg;
    }

    pub fn set_bg(&mut self, bg: Color) {
        self.bg = bg;
    }

    pub fn set_deco(&mut self, deco: Color) {
        self.deco = deco;
    }

    /// Add style bits.
    pub fn set_style(&mut self, style: Style) {
        self.style |= style;
    }

    /// Remove style bits.
    pub fn unset_style(&mut self, style: Style) {
        self.style -= style;
    }

    /// Clear all style bits.
    pub fn reset_style(&mut self) {
        self.style = Style::empty();
    }

    /// Attach a patch; passing `None` for both strings clears it.
    pub fn set_patch(&mut self, optimize: bool, setup: Option<&str>, cleanup: Option<&str>) {
        self.patch = match (setup, cleanup) {
            (None, None) => None,
            (s, c) => Some(Patch {
                optimize,
                setup: s.unwrap_or("").to_string(),
                cleanup: c.unwrap_or("").to_string(),
            }),
        };
    }

    /// Builder-style variants used all over the tests.
    pub fn with_style(mut self, style: Style) -> Self {
        self.set_style(style);
        self
    }

    pub fn with_deco(mut self, deco: Color) -> Self {
        self.deco = deco;
        self
    }

    pub fn with_patch(mut self, optimize: bool, setup: &str, cleanup: &str) -> Self {
        self.set_patch(optimize, Some(setup), Some(cleanup));
        self
    }
}
