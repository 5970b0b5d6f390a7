//! Cell-grid surface model.
//!
//! A [`Surface`] is a width × height grid of cells. Each cell stores one
//! grapheme cluster (inline when short, interned when long), foreground /
//! background / decoration colors, a style bitset, an optional patch (a pair
//! of passthrough escape strings wrapping a run of cells, e.g. hyperlinks)
//! and a soft-wrap marker. Double-width clusters occupy a master cell plus a
//! continuation cell immediately to its right.
//!
//! Invariants:
//! - A continuation cell only ever sits directly right of its master.
//!   Operations that would split a pair overwrite both halves; the orphaned
//!   half becomes a space carrying the pair's colors (the "vanish" rule).
//! - All coordinates clip silently. There is no error path out of the grid.
//! - Cluster and patch storage is reclaimed by a mark/sweep pass rooted at
//!   the live cells; patches are limited to 255 live entries per surface and
//!   degrade to "no patch" beyond that.

pub mod attr;
mod cell;
pub mod color;
pub mod intern;
pub mod style;
pub mod surface;

pub use attr::{Attr, Patch};
pub use color::Color;
pub use style::Style;
pub use surface::{CopyTile, Surface, ERASED};
