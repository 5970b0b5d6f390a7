//! Scalar and cluster display widths.
//!
//! The grid model needs exactly three width classes: zero (combining marks,
//! zero-width joiners), single, and double (East Asian wide / fullwidth).
//! `unicode-width` already encodes the relevant tables; this module pins the
//! mapping into `{0, 1, 2}` and adds the cluster-level rules on top.

use unicode_width::UnicodeWidthChar;

/// Regional Indicator range (two of these pair up into one flag cluster).
fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

/// True for scalars that occupy no column of their own: non-spacing marks,
/// enclosing marks, zero-width joiners and variation selectors.
#[inline]
pub fn is_zero_width(c: char) -> bool {
    UnicodeWidthChar::width(c) == Some(0)
}

/// Display width class of a single scalar: 0, 1 or 2.
///
/// Control characters have no width of their own; they are substituted before
/// they ever reach a cell, so this returns 1 for them to keep callers total.
#[inline]
pub fn char_width(c: char) -> u8 {
    match UnicodeWidthChar::width(c) {
        Some(w) => w.min(2) as u8,
        None => 1,
    }
}

/// Display width of one grapheme cluster: 1 or 2 columns.
///
/// The base scalar decides. A cluster that starts with a zero-width scalar
/// has no base of its own (the write path renders it over U+00A0), so it
/// counts as a single column. Empty input counts as a single column as well;
/// it never occurs from segmentation.
#[inline]
pub fn cluster_width(cluster: &str) -> u8 {
    match cluster.chars().next() {
        Some(c) => {
            let w = char_width(c);
            if w == 0 {
                1
            } else {
                w
            }
        }
        None => 1,
    }
}

/// Does `next` start a new cluster after `prev`?
///
/// `next` continues the current cluster when it is zero-width (combining
/// marks, ZWJ, variation selectors) or when it is the second half of a
/// regional-indicator pair.
pub fn is_cluster_boundary(prev: Option<char>, next: char) -> bool {
    if is_zero_width(next) {
        return false;
    }
    match prev {
        Some(p) if is_regional_indicator(p) && is_regional_indicator(next) => false,
        _ => true,
    }
}
