//! Cell colors.
//!
//! Four disjoint namespaces: the default color, the 16 named terminal
//! colors, the 256-entry indexed palette and direct RGB. Equality is
//! structural; `Named(1)` and `Indexed(1)` are different colors even when a
//! terminal happens to render them alike.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// The terminal's configured default (distinct for fg and bg use).
    #[default]
    Default,
    /// One of the 16 named colors, index 0–15.
    Named(u8),
    /// 256-color palette entry.
    Indexed(u8),
    /// Direct color.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Color = Color::Named(0);
    pub const RED: Color = Color::Named(1);
    pub const GREEN: Color = Color::Named(2);
    pub const YELLOW: Color = Color::Named(3);
    pub const BLUE: Color = Color::Named(4);
    pub const MAGENTA: Color = Color::Named(5);
    pub const CYAN: Color = Color::Named(6);
    pub const LIGHT_GREY: Color = Color::Named(7);
    pub const DARK_GREY: Color = Color::Named(8);
    pub const BRIGHT_RED: Color = Color::Named(9);
    pub const BRIGHT_GREEN: Color = Color::Named(10);
    pub const BRIGHT_YELLOW: Color = Color::Named(11);
    pub const BRIGHT_BLUE: Color = Color::Named(12);
    pub const BRIGHT_MAGENTA: Color = Color::Named(13);
    pub const BRIGHT_CYAN: Color = Color::Named(14);
    pub const WHITE: Color = Color::Named(15);

    #[inline]
    pub fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color::Rgb(r, g, b)
    }
}
