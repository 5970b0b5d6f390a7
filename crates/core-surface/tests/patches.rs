//! Patch (passthrough escape pair) storage and its 255-slot degradation.

mod common;

use common::{check_empty_plus_some, read_cell, CellSnap};
use core_surface::{Attr, Color, Surface};

#[test]
fn simple_patch() {
    let mut s = Surface::new(80, 6);
    s.clear(Color::Default, Color::Default);
    let attr = Attr::new(Color::Default, Color::Default).with_patch(
        false,
        "\u{1b}]8;;http://example.com\u{1b}\\",
        "\u{1b}]8;;\u{1b}\\",
    );
    s.write(10, 3, "ab", &attr);
    check_empty_plus_some(
        &s,
        &[
            (
                (10, 3),
                CellSnap::glyph("a").patch(
                    false,
                    "\u{1b}]8;;http://example.com\u{1b}\\",
                    "\u{1b}]8;;\u{1b}\\",
                ),
            ),
            (
                (11, 3),
                CellSnap::glyph("b").patch(
                    false,
                    "\u{1b}]8;;http://example.com\u{1b}\\",
                    "\u{1b}]8;;\u{1b}\\",
                ),
            ),
        ],
        CellSnap::erased(),
    );
}

#[test]
fn optimize_flag_is_stored() {
    let mut s = Surface::new(10, 2);
    s.clear(Color::Default, Color::Default);
    let attr = Attr::new(Color::Default, Color::Default).with_patch(true, "blub", "blah");
    s.write(1, 1, "r", &attr);
    let p = s.peek_patch(1, 1).unwrap();
    assert!(p.optimize);
    assert_eq!(p.setup, "blub");
    assert_eq!(p.cleanup, "blah");
}

#[test]
fn identical_patches_share_one_slot() {
    let mut s = Surface::new(80, 4);
    s.clear(Color::Default, Color::Default);
    let attr = Attr::new(Color::Default, Color::Default).with_patch(false, "s", "c");
    for x in 0..40 {
        s.write(x, 1, "x", &attr);
    }
    assert_eq!(s.patch_count(), 1);
}

#[test]
fn too_many_patches_degrade_to_none() {
    let mut s = Surface::new(80, 24);
    s.clear(Color::Default, Color::Default);
    for i in 0..300 {
        let attr = Attr::new(Color::Default, Color::Default).with_patch(
            false,
            &format!("s{i}"),
            &format!("c{i}"),
        );
        s.write(i % 80, i / 80, "x", &attr);
    }
    // The first 255 distinct patches stick; later writes silently degrade.
    let p = s.peek_patch(0, 0).unwrap();
    assert_eq!(p.setup, "s0");
    assert!(s.peek_patch(20, 3).is_none());
    assert_eq!(s.patch_count(), 255);
}

#[test]
fn dead_patches_are_reclaimed() {
    let mut s = Surface::new(10, 2);
    s.clear(Color::Default, Color::Default);
    // One live patch at a time; the pool never degrades because dead
    // entries are collected when the limit is hit.
    for i in 0..300 {
        let attr = Attr::new(Color::Default, Color::Default).with_patch(
            true,
            &format!("setup{i}"),
            &format!("cleanup{i}"),
        );
        s.write(1, 1, "x", &attr);
    }
    let p = s.peek_patch(1, 1).expect("latest patch must not degrade");
    assert_eq!(p.setup, "setup299");
    assert!(s.patch_count() <= 255);
}

#[test]
fn patch_cleared_by_overwrite() {
    let mut s = Surface::new(10, 2);
    s.clear(Color::Default, Color::Default);
    let attr = Attr::new(Color::Default, Color::Default).with_patch(false, "s", "c");
    s.write(1, 1, "x", &attr);
    s.write_with_colors(1, 1, "y", Color::Default, Color::Default);
    assert!(s.peek_patch(1, 1).is_none());
    assert_eq!(read_cell(&s, 1, 1), CellSnap::glyph("y"));
}
