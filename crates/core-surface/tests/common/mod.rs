//! Shared cell-snapshot helpers for the surface integration tests.

#![allow(dead_code)]

use core_surface::{Color, Style, Surface, ERASED};

/// Flat readout of one cell through the public peek API.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSnap {
    pub text: String,
    pub fg: Color,
    pub bg: Color,
    pub deco: Color,
    pub style: Style,
    pub width: i32,
    pub setup: String,
    pub cleanup: String,
    pub optimize: bool,
    pub soft_wrap: bool,
}

impl CellSnap {
    pub fn erased() -> CellSnap {
        CellSnap::glyph(ERASED)
    }

    pub fn glyph(text: &str) -> CellSnap {
        CellSnap {
            text: text.to_string(),
            fg: Color::Default,
            bg: Color::Default,
            deco: Color::Default,
            style: Style::empty(),
            width: 1,
            setup: String::new(),
            cleanup: String::new(),
            optimize: false,
            soft_wrap: false,
        }
    }

    pub fn wide(text: &str) -> CellSnap {
        CellSnap {
            width: 2,
            ..CellSnap::glyph(text)
        }
    }

    pub fn fg(mut self, fg: Color) -> CellSnap {
        self.fg = fg;
        self
    }

    pub fn bg(mut self, bg: Color) -> CellSnap {
        self.bg = bg;
        self
    }

    pub fn deco(mut self, deco: Color) -> CellSnap {
        self.deco = deco;
        self
    }

    pub fn style(mut self, style: Style) -> CellSnap {
        self.style = style;
        self
    }

    pub fn patch(mut self, optimize: bool, setup: &str, cleanup: &str) -> CellSnap {
        self.optimize = optimize;
        self.setup = setup.to_string();
        self.cleanup = cleanup.to_string();
        self
    }

    pub fn soft_wrap(mut self) -> CellSnap {
        self.soft_wrap = true;
        self
    }
}

pub fn read_cell(surface: &Surface, x: i32, y: i32) -> CellSnap {
    let (text, left, right) = surface.peek_text(x, y).expect("peek in bounds");
    assert_eq!(left, x, "read_cell must be called on a master column");
    let (setup, cleanup, optimize) = match surface.peek_patch(x, y) {
        Some(p) => (p.setup.clone(), p.cleanup.clone(), p.optimize),
        None => (String::new(), String::new(), false),
    };
    CellSnap {
        text: text.to_string(),
        fg: surface.peek_fg_color(x, y).unwrap(),
        bg: surface.peek_bg_color(x, y).unwrap(),
        deco: surface.peek_deco_color(x, y).unwrap(),
        style: surface.peek_style(x, y).unwrap(),
        width: right - left + 1,
        setup,
        cleanup,
        optimize,
        soft_wrap: surface.peek_softwrap_marker(x, y).unwrap(),
    }
}

/// Assert that the whole surface equals `empty` except for the listed cells.
/// Walks master columns only, advancing by each cell's width.
pub fn check_empty_plus_some(surface: &Surface, some: &[((i32, i32), CellSnap)], empty: CellSnap) {
    for y in 0..surface.height() {
        let mut x = 0;
        while x < surface.width() {
            let cell = read_cell(surface, x, y);
            let expected = some
                .iter()
                .find(|((ex, ey), _)| *ex == x && *ey == y)
                .map(|(_, c)| c)
                .unwrap_or(&empty);
            assert_eq!(cell, *expected, "cell mismatch at ({x}, {y})");
            x += cell.width;
        }
    }
}
