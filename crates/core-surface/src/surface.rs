//! The 2-D cell grid: writing, clearing, blitting, tinting, equality.
//!
//! Coordinates are (x, y) with the origin top-left. Every operation clips
//! silently; out-of-range coordinates have no effect beyond the clipped
//! region. Double-width handling follows one rule everywhere: a write that
//! lands on half of an existing pair resets the orphaned half to a space
//! carrying the pair's colors ("vanish").

use core_text::segment::{decode_lossy_erased, display_clusters, Segment};

use crate::attr::{Attr, Patch};
use crate::cell::{Cell, Glyph};
use crate::color::Color;
use crate::intern::{Handle, Pool};
use crate::style::Style;

/// Cluster value of a cleared cell as seen through `peek_text`.
pub const ERASED: &str = "\u{7F}";

/// Live patch entries a surface will hold before degrading to "no patch".
const PATCH_LIMIT: usize = 255;

/// Edge policy when a double-wide source glyph is bisected by a copy rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTile {
    /// Replace the bisected glyph with spaces carrying the matching colors.
    NoTile,
    /// Copy the whole glyph, extending the rect outward by one column.
    Put,
    /// Keep the destination's glyph when it is bisected the same way.
    Preserve,
}

#[derive(Debug, Clone)]
pub struct Surface {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    clusters: Pool<()>,
    patches: Pool<Patch>,
}

impl Surface {
    /// Create a surface. Negative or impossibly large dimensions collapse to
    /// an empty 0×0 surface.
    pub fn new(width: i32, height: i32) -> Surface {
        let (w, h) = checked_dims(width, height);
        Surface {
            width: w,
            height: h,
            cells: vec![Cell::default(); w * h],
            clusters: Pool::new(),
            patches: Pool::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width as i32
    }

    pub fn height(&self) -> i32 {
        self.height as i32
    }

    /// Independent copy comparing equal under [`Surface::same_contents`].
    pub fn duplicate(&self) -> Surface {
        self.clone()
    }

    // ---- geometry helpers -------------------------------------------------

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.cells[self.idx(x, y)]
    }

    /// Master cell of a double-wide pair, i.e. the next cell to the right is
    /// its continuation.
    fn is_wide_master(&self, x: usize, y: usize) -> bool {
        !self.cell(x, y).is_wide_right()
            && x + 1 < self.width
            && self.cell(x + 1, y).is_wide_right()
    }

    /// Prepare column `x` for being overwritten: if it is half of a wide
    /// pair, the other half becomes a space with the pair's old colors.
    fn split_pair_at(&mut self, x: usize, y: usize) {
        if self.cell(x, y).is_wide_right() {
            if x > 0 {
                let i = self.idx(x - 1, y);
                self.cells[i] = self.cells[i].vanish_residue();
            }
        } else if self.is_wide_master(x, y) {
            let i = self.idx(x + 1, y);
            self.cells[i] = self.cells[i].vanish_residue();
        }
    }

    // ---- intern housekeeping ---------------------------------------------

    fn intern_cluster(&mut self, text: &str) -> Handle {
        if self.clusters.get(text.as_bytes()).is_none() && self.clusters.is_crowded() {
            let live: Vec<Handle> = self
                .cells
                .iter()
                .filter_map(|c| match c.glyph {
                    Glyph::Interned(h) => Some(h),
                    _ => None,
                })
                .collect();
            self.clusters.gc(live);
            if self.clusters.is_crowded() {
                self.clusters.grow();
            }
        }
        self.clusters.ensure(text.as_bytes(), || ())
    }

    fn intern_patch(&mut self, patch: Option<&Patch>) -> Option<Handle> {
        let patch = patch?;
        let key = patch_key(patch);
        if let Some(h) = self.patches.get(&key) {
            return Some(h);
        }
        if self.patches.len() >= PATCH_LIMIT {
            let live: Vec<Handle> = self.cells.iter().filter_map(|c| c.patch).collect();
            self.patches.gc(live);
            if self.patches.len() >= PATCH_LIMIT {
                tracing::debug!("patch slots exhausted, write degrades to no patch");
                return None;
            }
        }
        Some(self.patches.ensure(&key, || patch.clone()))
    }

    fn glyph_for(&mut self, text: &str) -> Glyph {
        match Glyph::inline(text) {
            Some(g) => g,
            None => Glyph::Interned(self.intern_cluster(text)),
        }
    }

    // ---- writing ----------------------------------------------------------

    pub fn write(&mut self, x: i32, y: i32, text: &str, attr: &Attr) {
        self.write_clipped(x, y, text, attr, 0, i32::MAX);
    }

    pub fn write_with_colors(&mut self, x: i32, y: i32, text: &str, fg: Color, bg: Color) {
        self.write(x, y, text, &Attr::new(fg, bg));
    }

    /// Write raw bytes; invalid UTF-8 shows up as erased cells.
    pub fn write_bytes(&mut self, x: i32, y: i32, bytes: &[u8], attr: &Attr) {
        let text = decode_lossy_erased(bytes);
        self.write(x, y, &text, attr);
    }

    /// Write limited to columns `clip_x0..=clip_x1` (clamped to the grid).
    pub fn write_clipped(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        attr: &Attr,
        clip_x0: i32,
        clip_x1: i32,
    ) {
        if self.width == 0 || self.height == 0 || y < 0 || y as usize >= self.height {
            return;
        }
        let y = y as usize;
        let clip0 = clip_x0.max(0) as i64;
        let clip1 = clip_x1.min(self.width as i32 - 1) as i64;
        if clip0 > clip1 {
            return;
        }
        let patch = self.intern_patch(attr.patch());
        let style = attr.style().resolve_underlines();
        let mut cx = x as i64;
        for seg in display_clusters(text) {
            let w = seg.width() as i64;
            let (span0, span1) = (cx, cx + w - 1);
            cx += w;
            if span1 < clip0 || span0 > clip1 {
                continue;
            }
            if w == 2 && (span0 < clip0 || span1 > clip1) {
                // Half of a wide glyph is clipped away: a single space with
                // the glyph's colors fills the visible column.
                let vis = if span0 < clip0 { span1 } else { span0 } as usize;
                self.split_pair_at(vis, y);
                let i = self.idx(vis, y);
                self.cells[i] = stamp(Glyph::SPACE, attr, style, patch);
                continue;
            }
            let c0 = span0 as usize;
            self.split_pair_at(c0, y);
            if w == 2 {
                self.split_pair_at(c0 + 1, y);
            }
            let glyph = match &seg {
                Segment::Erased => Glyph::Erased,
                Segment::Cluster { text, .. } => self.glyph_for(text),
            };
            let i = self.idx(c0, y);
            self.cells[i] = stamp(glyph, attr, style, patch);
            if w == 2 {
                self.cells[i + 1] = stamp(Glyph::WideRight, attr, style, patch);
            }
        }
    }

    // ---- clearing ---------------------------------------------------------

    pub fn clear(&mut self, fg: Color, bg: Color) {
        self.clear_with_attr(&Attr::new(fg, bg));
    }

    pub fn clear_with_char(&mut self, fg: Color, bg: Color, ch: char) {
        self.clear_rect_with_attr_char(
            0,
            0,
            self.width as i32,
            self.height as i32,
            &Attr::new(fg, bg),
            ch,
        );
    }

    pub fn clear_with_attr(&mut self, attr: &Attr) {
        self.clear_rect_with_attr(0, 0, self.width as i32, self.height as i32, attr);
    }

    pub fn clear_with_attr_char(&mut self, attr: &Attr, ch: char) {
        self.clear_rect_with_attr_char(0, 0, self.width as i32, self.height as i32, attr, ch);
    }

    pub fn clear_rect(&mut self, x: i32, y: i32, w: i32, h: i32, fg: Color, bg: Color) {
        self.clear_rect_with_attr(x, y, w, h, &Attr::new(fg, bg));
    }

    pub fn clear_rect_with_char(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        fg: Color,
        bg: Color,
        ch: char,
    ) {
        self.clear_rect_with_attr_char(x, y, w, h, &Attr::new(fg, bg), ch);
    }

    pub fn clear_rect_with_attr(&mut self, x: i32, y: i32, w: i32, h: i32, attr: &Attr) {
        self.clear_rect_impl(x, y, w, h, attr, Glyph::Erased);
    }

    /// Fill with `ch`; characters that cannot occupy exactly one column
    /// (wide, combining, controls) degrade to the erased marker.
    pub fn clear_rect_with_attr_char(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        attr: &Attr,
        ch: char,
    ) {
        self.clear_rect_impl(x, y, w, h, attr, fill_glyph(ch));
    }

    fn clear_rect_impl(&mut self, x: i32, y: i32, w: i32, h: i32, attr: &Attr, glyph: Glyph) {
        if w <= 0 || h <= 0 || self.width == 0 || self.height == 0 {
            return;
        }
        let x0 = x.max(0) as usize;
        let y0 = y.max(0) as usize;
        let x1 = ((x as i64 + w as i64 - 1).min(self.width as i64 - 1)).max(-1);
        let y1 = ((y as i64 + h as i64 - 1).min(self.height as i64 - 1)).max(-1);
        if x1 < x0 as i64 || y1 < y0 as i64 {
            return;
        }
        let (x1, y1) = (x1 as usize, y1 as usize);
        let patch = self.intern_patch(attr.patch());
        let style = attr.style().resolve_underlines();
        for row in y0..=y1 {
            self.split_pair_at(x0, row);
            self.split_pair_at(x1, row);
            for col in x0..=x1 {
                let i = self.idx(col, row);
                self.cells[i] = stamp(glyph.clone(), attr, style, patch);
            }
        }
    }

    // ---- per-cell mutators -------------------------------------------------

    pub fn set_fg(&mut self, x: i32, y: i32, fg: Color) {
        if self.in_bounds(x, y) {
            let i = self.idx(x as usize, y as usize);
            self.cells[i].fg = fg;
        }
    }

    pub fn set_bg(&mut self, x: i32, y: i32, bg: Color) {
        if self.in_bounds(x, y) {
            let i = self.idx(x as usize, y as usize);
            self.cells[i].bg = bg;
        }
    }

    pub fn set_deco(&mut self, x: i32, y: i32, deco: Color) {
        if self.in_bounds(x, y) {
            let i = self.idx(x as usize, y as usize);
            self.cells[i].deco = deco;
        }
    }

    pub fn set_softwrap_marker(&mut self, x: i32, y: i32, marker: bool) {
        if self.in_bounds(x, y) {
            let i = self.idx(x as usize, y as usize);
            self.cells[i].soft_wrap = marker;
        }
    }

    /// Walk every cell, letting the callback rewrite its colors. Clusters,
    /// style and width are untouched.
    pub fn tint(&mut self, mut f: impl FnMut(&mut Color, &mut Color, &mut Color)) {
        for cell in &mut self.cells {
            f(&mut cell.fg, &mut cell.bg, &mut cell.deco);
        }
    }

    // ---- read-only queries --------------------------------------------------

    /// Cluster at (x, y) plus the column span `[left, right]` it covers.
    /// A peek at a continuation column resolves to the pair's master.
    pub fn peek_text(&self, x: i32, y: i32) -> Option<(&str, i32, i32)> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let y = y as usize;
        let mut mx = x as usize;
        if self.cell(mx, y).is_wide_right() && mx > 0 {
            mx -= 1;
        }
        let w = if self.is_wide_master(mx, y) { 2 } else { 1 };
        let text = self.resolve_glyph(self.cell(mx, y));
        Some((text, mx as i32, (mx + w - 1) as i32))
    }

    fn resolve_glyph<'a>(&'a self, cell: &'a Cell) -> &'a str {
        match &cell.glyph {
            Glyph::Erased | Glyph::WideRight => ERASED,
            Glyph::Inline { len, bytes } => {
                std::str::from_utf8(&bytes[..*len as usize]).unwrap_or(ERASED)
            }
            Glyph::Interned(h) => std::str::from_utf8(self.clusters.key(*h)).unwrap_or(ERASED),
        }
    }

    pub fn peek_fg_color(&self, x: i32, y: i32) -> Option<Color> {
        self.in_bounds(x, y)
            .then(|| self.cell(x as usize, y as usize).fg)
    }

    pub fn peek_bg_color(&self, x: i32, y: i32) -> Option<Color> {
        self.in_bounds(x, y)
            .then(|| self.cell(x as usize, y as usize).bg)
    }

    pub fn peek_deco_color(&self, x: i32, y: i32) -> Option<Color> {
        self.in_bounds(x, y)
            .then(|| self.cell(x as usize, y as usize).deco)
    }

    pub fn peek_style(&self, x: i32, y: i32) -> Option<Style> {
        self.in_bounds(x, y)
            .then(|| self.cell(x as usize, y as usize).style)
    }

    pub fn peek_patch(&self, x: i32, y: i32) -> Option<&Patch> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let h = self.cell(x as usize, y as usize).patch?;
        self.patches.value(h)
    }

    pub fn peek_softwrap_marker(&self, x: i32, y: i32) -> Option<bool> {
        self.in_bounds(x, y)
            .then(|| self.cell(x as usize, y as usize).soft_wrap)
    }

    /// Deep equality over every cell field, patches and soft-wrap markers
    /// included. No Unicode normalization: precomposed and decomposed forms
    /// compare unequal.
    pub fn same_contents(&self, other: &Surface) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }
        for (a, b) in self.cells.iter().zip(other.cells.iter()) {
            if a.fg != b.fg
                || a.bg != b.bg
                || a.deco != b.deco
                || a.style != b.style
                || a.soft_wrap != b.soft_wrap
            {
                return false;
            }
            let wide_a = a.is_wide_right();
            if wide_a != b.is_wide_right() {
                return false;
            }
            if !wide_a && self.resolve_glyph(a) != other.resolve_glyph(b) {
                return false;
            }
            let pa = a.patch.and_then(|h| self.patches.value(h));
            let pb = b.patch.and_then(|h| other.patches.value(h));
            if pa != pb {
                return false;
            }
        }
        true
    }

    // ---- blitting -----------------------------------------------------------

    /// Copy a `w`×`h` rect from `src` at (sx, sy) to (dx, dy) in `self`.
    ///
    /// The tile policies apply when a double-wide *source* glyph is bisected
    /// by the left or right rect edge. A destination pair bisected by plain
    /// copied cells always follows the vanish rule.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_rect_from(
        &mut self,
        src: &Surface,
        sx: i32,
        sy: i32,
        w: i32,
        h: i32,
        dx: i32,
        dy: i32,
        tile_left: CopyTile,
        tile_right: CopyTile,
    ) {
        if w <= 0 || h <= 0 {
            return;
        }
        for row in 0..h as i64 {
            let sr = sy as i64 + row;
            let dr = dy as i64 + row;
            if sr < 0 || sr >= src.height as i64 || dr < 0 || dr >= self.height as i64 {
                continue;
            }
            self.copy_row(
                src,
                sr as usize,
                sx as i64,
                w as i64,
                dr as usize,
                dx as i64,
                tile_left,
                tile_right,
            );
        }
    }

    /// Copy between two rects of the same surface; behaves exactly like a
    /// copy through a transient duplicate.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_rect_within(
        &mut self,
        sx: i32,
        sy: i32,
        w: i32,
        h: i32,
        dx: i32,
        dy: i32,
        tile_left: CopyTile,
        tile_right: CopyTile,
    ) {
        let snapshot = self.duplicate();
        self.copy_rect_from(&snapshot, sx, sy, w, h, dx, dy, tile_left, tile_right);
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_row(
        &mut self,
        src: &Surface,
        sr: usize,
        sx: i64,
        w: i64,
        dr: usize,
        dx: i64,
        tile_left: CopyTile,
        tile_right: CopyTile,
    ) {
        let last = sx + w - 1;
        let mut scol = sx;
        while scol <= last {
            let dcol = dx + (scol - sx);
            if scol < 0 || scol >= src.width as i64 {
                scol += 1;
                continue;
            }
            let sc = scol as usize;
            let scell = src.cell(sc, sr);
            if scell.is_wide_right() {
                if scol == sx && sc > 0 {
                    // Source glyph bisected by the left rect edge.
                    match tile_left {
                        CopyTile::Put => {
                            let master = src.cell(sc - 1, sr).clone();
                            self.put_copied_pair(src, &master, dcol - 1, dr);
                        }
                        CopyTile::Preserve
                            if dcol >= 0
                                && dcol < self.width as i64
                                && self.cell(dcol as usize, dr).is_wide_right() => {}
                        CopyTile::NoTile | CopyTile::Preserve => {
                            self.put_space_like(src, scell, dcol, dr);
                        }
                    }
                }
                // Mid-rect continuations were handled with their master.
                scol += 1;
                continue;
            }
            if src.is_wide_master(sc, sr) {
                if scol == last {
                    // Source glyph bisected by the right rect edge.
                    match tile_right {
                        CopyTile::Put => {
                            let master = scell.clone();
                            self.put_copied_pair(src, &master, dcol, dr);
                        }
                        CopyTile::Preserve
                            if dcol >= 0
                                && dcol < self.width as i64
                                && self.is_wide_master(dcol as usize, dr) => {}
                        CopyTile::NoTile | CopyTile::Preserve => {
                            self.put_space_like(src, scell, dcol, dr);
                        }
                    }
                    break;
                }
                let master = scell.clone();
                self.put_copied_pair(src, &master, dcol, dr);
                scol += 2;
                continue;
            }
            let single = scell.clone();
            self.put_copied_single(src, &single, dcol, dr);
            scol += 1;
        }
    }

    fn import_cell(&mut self, src: &Surface, cell: &Cell) -> Cell {
        let glyph = match &cell.glyph {
            Glyph::Interned(_) => {
                let text = src.resolve_glyph(cell).to_string();
                self.glyph_for(&text)
            }
            g => g.clone(),
        };
        let patch = cell
            .patch
            .and_then(|h| src.patches.value(h).cloned())
            .and_then(|p| self.intern_patch(Some(&p)));
        Cell {
            glyph,
            patch,
            ..cell.clone()
        }
    }

    fn put_copied_single(&mut self, src: &Surface, cell: &Cell, dcol: i64, dr: usize) {
        if dcol < 0 || dcol >= self.width as i64 {
            return;
        }
        let x = dcol as usize;
        self.split_pair_at(x, dr);
        let imported = self.import_cell(src, cell);
        let i = self.idx(x, dr);
        self.cells[i] = imported;
    }

    /// Copy a full double-wide pair whose master cell is `master`, clipping
    /// to the destination: a half outside the grid degrades to a space in
    /// the visible column.
    fn put_copied_pair(&mut self, src: &Surface, master: &Cell, dcol: i64, dr: usize) {
        let cont = dcol + 1;
        let master_in = dcol >= 0 && dcol < self.width as i64;
        let cont_in = cont >= 0 && cont < self.width as i64;
        match (master_in, cont_in) {
            (true, true) => {
                let (x0, x1) = (dcol as usize, cont as usize);
                self.split_pair_at(x0, dr);
                self.split_pair_at(x1, dr);
                let imported = self.import_cell(src, master);
                let mut right = imported.clone();
                right.glyph = Glyph::WideRight;
                let i = self.idx(x0, dr);
                self.cells[i] = imported;
                self.cells[i + 1] = right;
            }
            (true, false) => self.put_space_like(src, master, dcol, dr),
            (false, true) => self.put_space_like(src, master, cont, dr),
            (false, false) => {}
        }
    }

    /// A single space cell carrying `cell`'s attributes.
    fn put_space_like(&mut self, src: &Surface, cell: &Cell, dcol: i64, dr: usize) {
        if dcol < 0 || dcol >= self.width as i64 {
            return;
        }
        let x = dcol as usize;
        self.split_pair_at(x, dr);
        let mut imported = self.import_cell(src, cell);
        imported.glyph = Glyph::SPACE;
        let i = self.idx(x, dr);
        self.cells[i] = imported;
    }

    // ---- resize -------------------------------------------------------------

    /// Truncate or extend, keeping top-left-aligned content. Impossible
    /// dimensions collapse the surface to 0×0.
    pub fn resize(&mut self, width: i32, height: i32) {
        let (nw, nh) = checked_dims(width, height);
        let mut cells = vec![Cell::default(); nw * nh];
        for y in 0..nh.min(self.height) {
            for x in 0..nw.min(self.width) {
                cells[y * nw + x] = self.cells[self.idx(x, y)].clone();
            }
            // A pair cut by the new right edge loses its glyph.
            if nw > 0 && nw < self.width && self.is_wide_master(nw - 1, y) {
                cells[y * nw + nw - 1] = cells[y * nw + nw - 1].vanish_residue();
            }
        }
        self.cells = cells;
        self.width = nw;
        self.height = nh;
        let live_clusters: Vec<Handle> = self
            .cells
            .iter()
            .filter_map(|c| match c.glyph {
                Glyph::Interned(h) => Some(h),
                _ => None,
            })
            .collect();
        self.clusters.gc(live_clusters);
        let live_patches: Vec<Handle> = self.cells.iter().filter_map(|c| c.patch).collect();
        self.patches.gc(live_patches);
    }

    /// Number of distinct interned clusters (diagnostics and tests).
    pub fn interned_cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of distinct live patches (diagnostics and tests).
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }
}

fn checked_dims(width: i32, height: i32) -> (usize, usize) {
    if width < 0 || height < 0 {
        return (0, 0);
    }
    let bytes =
        (width as i128) * (height as i128) * (std::mem::size_of::<Cell>() as i128);
    if bytes > isize::MAX as i128 / 2 {
        return (0, 0);
    }
    (width as usize, height as usize)
}

fn stamp(glyph: Glyph, attr: &Attr, style: Style, patch: Option<Handle>) -> Cell {
    Cell {
        glyph,
        fg: attr.fg(),
        bg: attr.bg(),
        deco: attr.deco(),
        style,
        patch,
        soft_wrap: false,
    }
}

/// Fill glyph for the clear-with-char family: anything that does not occupy
/// exactly one column falls back to the erased marker.
fn fill_glyph(ch: char) -> Glyph {
    let control = ch < ' '
        || ch == '\u{7F}'
        || ('\u{80}'..='\u{9F}').contains(&ch)
        || ch == '\u{AD}';
    if control || core_text::char_width(ch) != 1 {
        return Glyph::Erased;
    }
    let mut buf = [0u8; 4];
    Glyph::inline(ch.encode_utf8(&mut buf)).unwrap_or(Glyph::Erased)
}

fn patch_key(p: &Patch) -> Vec<u8> {
    let mut key = Vec::with_capacity(p.setup.len() + p.cleanup.len() + 6);
    key.extend_from_slice(&(p.setup.len() as u32).to_le_bytes());
    key.extend_from_slice(p.setup.as_bytes());
    key.extend_from_slice(p.cleanup.as_bytes());
    key.push(p.optimize as u8);
    key
}
