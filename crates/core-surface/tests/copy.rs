//! Rectangular blits: clipping, attribute transport and the double-wide
//! edge policies.

mod common;

use common::{check_empty_plus_some, read_cell, CellSnap};
use core_surface::{Attr, Color, CopyTile, Style, Surface};

const TILES: [CopyTile; 3] = [CopyTile::NoTile, CopyTile::Put, CopyTile::Preserve];

fn sample_src() -> Surface {
    let mut s1 = Surface::new(80, 24);
    s1.write_with_colors(10, 3, "Sample", Color::BLUE, Color::YELLOW);
    s1
}

#[test]
fn copy_simple() {
    for tl in TILES {
        for tr in TILES {
            let mut dst = Surface::new(80, 24);
            dst.clear(Color::CYAN, Color::GREEN);
            let src = sample_src();
            dst.copy_rect_from(&src, 9, 3, 8, 1, 23, 15, tl, tr);
            check_empty_plus_some(
                &dst,
                &[
                    ((23, 15), CellSnap::erased()),
                    ((24, 15), CellSnap::glyph("S").fg(Color::BLUE).bg(Color::YELLOW)),
                    ((25, 15), CellSnap::glyph("a").fg(Color::BLUE).bg(Color::YELLOW)),
                    ((26, 15), CellSnap::glyph("m").fg(Color::BLUE).bg(Color::YELLOW)),
                    ((27, 15), CellSnap::glyph("p").fg(Color::BLUE).bg(Color::YELLOW)),
                    ((28, 15), CellSnap::glyph("l").fg(Color::BLUE).bg(Color::YELLOW)),
                    ((29, 15), CellSnap::glyph("e").fg(Color::BLUE).bg(Color::YELLOW)),
                    ((30, 15), CellSnap::erased()),
                ],
                CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN),
            );
        }
    }
}

#[test]
fn copy_zero_width_rect_is_noop() {
    for tl in TILES {
        for tr in TILES {
            let mut dst = Surface::new(80, 24);
            dst.clear(Color::CYAN, Color::GREEN);
            let src = sample_src();
            dst.copy_rect_from(&src, 9, 3, 0, 1, 23, 15, tl, tr);
            check_empty_plus_some(&dst, &[], CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN));
        }
    }
}

#[test]
fn copy_rect_outside_src_is_noop() {
    let mut dst = Surface::new(80, 24);
    dst.clear(Color::CYAN, Color::GREEN);
    let src = sample_src();
    dst.copy_rect_from(&src, 80, 3, 4, 1, 23, 15, CopyTile::NoTile, CopyTile::NoTile);
    dst.copy_rect_from(&src, 9, 24, 4, 1, 23, 15, CopyTile::NoTile, CopyTile::NoTile);
    check_empty_plus_some(&dst, &[], CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN));
}

#[test]
fn copy_partially_above_src_shifts_down() {
    let mut dst = Surface::new(80, 24);
    dst.clear(Color::CYAN, Color::GREEN);
    let mut src = Surface::new(80, 24);
    src.write_with_colors(10, 0, "Sample", Color::BLUE, Color::YELLOW);
    dst.copy_rect_from(&src, 9, -1, 8, 2, 23, 15, CopyTile::NoTile, CopyTile::NoTile);
    check_empty_plus_some(
        &dst,
        &[
            ((23, 16), CellSnap::erased()),
            ((24, 16), CellSnap::glyph("S").fg(Color::BLUE).bg(Color::YELLOW)),
            ((25, 16), CellSnap::glyph("a").fg(Color::BLUE).bg(Color::YELLOW)),
            ((26, 16), CellSnap::glyph("m").fg(Color::BLUE).bg(Color::YELLOW)),
            ((27, 16), CellSnap::glyph("p").fg(Color::BLUE).bg(Color::YELLOW)),
            ((28, 16), CellSnap::glyph("l").fg(Color::BLUE).bg(Color::YELLOW)),
            ((29, 16), CellSnap::glyph("e").fg(Color::BLUE).bg(Color::YELLOW)),
            ((30, 16), CellSnap::erased()),
        ],
        CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN),
    );
}

#[test]
fn copy_preserves_substituted_chars() {
    let mut src = Surface::new(80, 24);
    src.clear(Color::Default, Color::Default);
    src.write_with_colors(3, 3, "a\u{4}\u{AD}\u{88}x", Color::Default, Color::Default);
    let mut dst = Surface::new(80, 24);
    dst.copy_rect_from(&src, 0, 0, 80, 24, 0, 0, CopyTile::NoTile, CopyTile::NoTile);
    for surface in [&src, &dst] {
        check_empty_plus_some(
            surface,
            &[
                ((3, 3), CellSnap::glyph("a")),
                ((4, 3), CellSnap::glyph(" ")),
                ((5, 3), CellSnap::glyph("-")),
                ((6, 3), CellSnap::glyph(" ")),
                ((7, 3), CellSnap::glyph("x")),
            ],
            CellSnap::erased(),
        );
    }
}

#[test]
fn copy_preserves_attributes_patches_and_softwrap() {
    let mut src = Surface::new(80, 24);
    src.clear(Color::Default, Color::Default);
    let attr = Attr::new(Color::RED, Color::BLUE)
        .with_style(Style::BOLD | Style::UNDERLINE)
        .with_deco(Color::CYAN)
        .with_patch(true, "setup", "cleanup");
    src.write(3, 3, "ab", &attr);
    src.set_softwrap_marker(4, 3, true);

    let mut dst = Surface::new(80, 24);
    dst.copy_rect_from(&src, 0, 0, 80, 24, 0, 0, CopyTile::NoTile, CopyTile::NoTile);

    let expect_a = CellSnap::glyph("a")
        .fg(Color::RED)
        .bg(Color::BLUE)
        .deco(Color::CYAN)
        .style(Style::BOLD | Style::UNDERLINE)
        .patch(true, "setup", "cleanup");
    let mut expect_b = expect_a.clone();
    expect_b.text = "b".to_string();
    let expect_b = expect_b.soft_wrap();
    assert_eq!(read_cell(&dst, 3, 3), expect_a);
    assert_eq!(read_cell(&dst, 4, 3), expect_b);
}

#[test]
fn copy_from_uninit_cells_carries_defaults() {
    let mut dst = Surface::new(80, 24);
    dst.clear(Color::CYAN, Color::GREEN);
    let src = Surface::new(80, 24);
    dst.copy_rect_from(&src, 9, 3, 8, 1, 23, 15, CopyTile::NoTile, CopyTile::NoTile);
    let mut expected = Vec::new();
    for x in 23..=30 {
        expected.push(((x, 15), CellSnap::erased()));
    }
    check_empty_plus_some(&dst, &expected, CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN));
}

/// Fixture for the edge policies: dest row `ＡＢＣＤＥＦＧ` at 20, src row
/// `ａｂｃｄｅｆｇ` at 6, copying src columns 9..=16 to dest 23..=30 cuts
/// `ｂ`/`Ｂ` at the left edge and `ｆ`/`Ｆ` at the right edge.
fn dw_fixture() -> (Surface, Surface) {
    let mut dst = Surface::new(80, 24);
    dst.clear(Color::CYAN, Color::GREEN);
    dst.write_with_colors(20, 15, "ＡＢＣＤＥＦＧ", Color::BRIGHT_CYAN, Color::BRIGHT_GREEN);
    let mut src = Surface::new(80, 24);
    src.clear(Color::WHITE, Color::BLACK);
    src.write_with_colors(6, 3, "ａｂｃｄｅｆｇ", Color::YELLOW, Color::MAGENTA);
    (dst, src)
}

#[test]
fn copy_double_wide_edges_single_line() {
    for tl in TILES {
        for tr in TILES {
            let (mut dst, src) = dw_fixture();
            dst.copy_rect_from(&src, 9, 3, 8, 1, 23, 15, tl, tr);

            let mut expected = vec![
                ((20, 15), CellSnap::wide("Ａ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN)),
                ((24, 15), CellSnap::wide("ｃ").fg(Color::YELLOW).bg(Color::MAGENTA)),
                ((26, 15), CellSnap::wide("ｄ").fg(Color::YELLOW).bg(Color::MAGENTA)),
                ((28, 15), CellSnap::wide("ｅ").fg(Color::YELLOW).bg(Color::MAGENTA)),
                ((32, 15), CellSnap::wide("Ｇ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN)),
            ];
            match tl {
                CopyTile::NoTile => {
                    expected.push((
                        (22, 15),
                        CellSnap::glyph(" ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN),
                    ));
                    expected.push((
                        (23, 15),
                        CellSnap::glyph(" ").fg(Color::YELLOW).bg(Color::MAGENTA),
                    ));
                }
                CopyTile::Put => {
                    expected.push((
                        (22, 15),
                        CellSnap::wide("ｂ").fg(Color::YELLOW).bg(Color::MAGENTA),
                    ));
                }
                CopyTile::Preserve => {
                    expected.push((
                        (22, 15),
                        CellSnap::wide("Ｂ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN),
                    ));
                }
            }
            match tr {
                CopyTile::NoTile => {
                    expected.push((
                        (30, 15),
                        CellSnap::glyph(" ").fg(Color::YELLOW).bg(Color::MAGENTA),
                    ));
                    expected.push((
                        (31, 15),
                        CellSnap::glyph(" ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN),
                    ));
                }
                CopyTile::Put => {
                    expected.push((
                        (30, 15),
                        CellSnap::wide("ｆ").fg(Color::YELLOW).bg(Color::MAGENTA),
                    ));
                }
                CopyTile::Preserve => {
                    expected.push((
                        (30, 15),
                        CellSnap::wide("Ｆ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN),
                    ));
                }
            }
            check_empty_plus_some(
                &dst,
                &expected,
                CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN),
            );
        }
    }
}

#[test]
fn copy_plain_cells_over_destination_pairs_vanishes_them() {
    // Source row is plain erased cells; destination has wide glyphs. Tile
    // policies do not apply (no source glyph is bisected); the destination
    // pairs at the boundary follow the vanish rule.
    for tl in TILES {
        for tr in TILES {
            let (mut dst, src) = dw_fixture();
            dst.copy_rect_from(&src, 9, 10, 8, 1, 23, 15, tl, tr);
            let mut expected = vec![
                ((20, 15), CellSnap::wide("Ａ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN)),
                ((22, 15), CellSnap::glyph(" ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN)),
                ((31, 15), CellSnap::glyph(" ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN)),
                ((32, 15), CellSnap::wide("Ｇ").fg(Color::BRIGHT_CYAN).bg(Color::BRIGHT_GREEN)),
            ];
            for x in 23..=30 {
                expected.push(((x, 15), CellSnap::erased().fg(Color::WHITE).bg(Color::BLACK)));
            }
            check_empty_plus_some(
                &dst,
                &expected,
                CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN),
            );
        }
    }
}

#[test]
fn copy_wide_pair_clipped_at_destination_edge() {
    let mut dst = Surface::new(80, 24);
    dst.clear(Color::CYAN, Color::GREEN);
    let mut src = Surface::new(80, 24);
    src.clear(Color::WHITE, Color::BLACK);
    src.write_with_colors(6, 3, "ａｂ", Color::YELLOW, Color::MAGENTA);
    // ｂ's continuation would land at column 80; the visible half becomes a
    // space with the glyph's colors.
    dst.copy_rect_from(&src, 6, 3, 4, 1, 77, 15, CopyTile::NoTile, CopyTile::NoTile);
    check_empty_plus_some(
        &dst,
        &[
            ((77, 15), CellSnap::wide("ａ").fg(Color::YELLOW).bg(Color::MAGENTA)),
            ((79, 15), CellSnap::glyph(" ").fg(Color::YELLOW).bg(Color::MAGENTA)),
        ],
        CellSnap::erased().fg(Color::CYAN).bg(Color::GREEN),
    );
}

#[test]
fn copy_same_surface_same_location_is_identity() {
    let (mut dst, _) = dw_fixture();
    let before = dst.duplicate();
    dst.copy_rect_within(20, 15, 14, 1, 20, 15, CopyTile::NoTile, CopyTile::NoTile);
    assert!(dst.same_contents(&before));
}

#[test]
fn copy_same_surface_behaves_like_via_duplicate() {
    let (orig, _) = dw_fixture();
    for tl in TILES {
        for tr in TILES {
            let mut within = orig.duplicate();
            within.copy_rect_within(20, 15, 8, 1, 40, 15, tl, tr);

            let mut via_dup = orig.duplicate();
            let snapshot = orig.duplicate();
            via_dup.copy_rect_from(&snapshot, 20, 15, 8, 1, 40, 15, tl, tr);

            assert!(within.same_contents(&via_dup));
        }
    }
}

#[test]
fn copy_overlapping_within_surface() {
    let mut s = Surface::new(80, 4);
    s.clear(Color::Default, Color::Default);
    s.write_with_colors(10, 1, "abcdef", Color::RED, Color::GREEN);
    s.copy_rect_within(10, 1, 6, 1, 12, 1, CopyTile::NoTile, CopyTile::NoTile);
    check_empty_plus_some(
        &s,
        &[
            ((10, 1), CellSnap::glyph("a").fg(Color::RED).bg(Color::GREEN)),
            ((11, 1), CellSnap::glyph("b").fg(Color::RED).bg(Color::GREEN)),
            ((12, 1), CellSnap::glyph("a").fg(Color::RED).bg(Color::GREEN)),
            ((13, 1), CellSnap::glyph("b").fg(Color::RED).bg(Color::GREEN)),
            ((14, 1), CellSnap::glyph("c").fg(Color::RED).bg(Color::GREEN)),
            ((15, 1), CellSnap::glyph("d").fg(Color::RED).bg(Color::GREEN)),
            ((16, 1), CellSnap::glyph("e").fg(Color::RED).bg(Color::GREEN)),
            ((17, 1), CellSnap::glyph("f").fg(Color::RED).bg(Color::GREEN)),
        ],
        CellSnap::erased(),
    );
}
