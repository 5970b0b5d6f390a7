//! Text-level primitives for the cell grid: scalar width classes, cluster
//! boundary checks and display segmentation.
//!
//! Everything in here is deterministic and stateless. The width tables come
//! from the `unicode-width` crate; cluster boundaries come from
//! `unicode-segmentation`. The bundled Unicode version is whatever those
//! crates ship; callers must not mix output of different versions of this
//! crate inside one surface.
//!
//! Invariants:
//! - All width decisions flow through [`char_width`] / [`cluster_width`];
//!   no other crate in the workspace consults `unicode-width` directly.
//! - Segmentation happens once, at the write boundary ([`display_clusters`]);
//!   cells store the resulting cluster strings verbatim.

pub mod segment;
pub mod width;

pub use segment::{decode_lossy_erased, display_clusters, Segment};
pub use width::{char_width, cluster_width, is_cluster_boundary, is_zero_width};
