//! Display segmentation: turn a string into the clusters a surface stores.
//!
//! Control characters never reach a cell. They are substituted here:
//! soft hyphen (U+00AD) becomes a visible "-", DEL (U+007F) becomes the
//! caller's erased marker, every other C0/C1 control becomes a space.
//! Substitution happens before cluster attachment, so a combining mark that
//! follows a control does not attach to it; it starts a fresh cluster that is
//! rendered over U+00A0 instead.

use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;

use crate::width::{cluster_width, is_zero_width};

/// One write-sized unit produced by [`display_clusters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A renderable cluster occupying `width` (1 or 2) columns.
    Cluster { text: Cow<'a, str>, width: u8 },
    /// DEL in the input; the caller stores its erased marker.
    Erased,
}

impl<'a> Segment<'a> {
    fn plain(text: &'a str) -> Self {
        Segment::Cluster {
            width: cluster_width(text),
            text: Cow::Borrowed(text),
        }
    }

    fn substitute(text: &'static str) -> Self {
        Segment::Cluster {
            text: Cow::Borrowed(text),
            width: 1,
        }
    }

    /// Column span of this segment.
    pub fn width(&self) -> u8 {
        match self {
            Segment::Cluster { width, .. } => *width,
            Segment::Erased => 1,
        }
    }
}

fn is_substituted_control(c: char) -> bool {
    c < ' ' || c == '\u{7F}' || ('\u{80}'..='\u{9F}').contains(&c) || c == '\u{AD}'
}

/// Segment `text` into display clusters with control substitution applied.
pub fn display_clusters(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.char_indices().find(|&(_, c)| is_substituted_control(c)) {
            Some((idx, c)) => {
                segment_run(&rest[..idx], &mut out);
                out.push(match c {
                    '\u{AD}' => Segment::substitute("-"),
                    '\u{7F}' => Segment::Erased,
                    _ => Segment::substitute(" "),
                });
                rest = &rest[idx + c.len_utf8()..];
            }
            None => {
                segment_run(rest, &mut out);
                break;
            }
        }
    }
    out
}

/// Segment one control-free run. The first cluster of a run may start with a
/// zero-width scalar; it gets a no-break-space base prepended.
fn segment_run<'a>(run: &'a str, out: &mut Vec<Segment<'a>>) {
    for (i, cluster) in run.graphemes(true).enumerate() {
        let leading_mark = cluster.chars().next().is_some_and(is_zero_width);
        if i == 0 && leading_mark {
            out.push(Segment::Cluster {
                text: Cow::Owned(format!("\u{00A0}{cluster}")),
                width: 1,
            });
        } else {
            out.push(Segment::plain(cluster));
        }
    }
}

/// Decode possibly-invalid UTF-8 for the write path. Invalid byte runs are
/// replaced by DEL so they surface as erased cells downstream.
pub fn decode_lossy_erased(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let mut out = String::with_capacity(bytes.len());
            let mut rest = bytes;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(s) => {
                        out.push_str(s);
                        break;
                    }
                    Err(e) => {
                        let (valid, after) = rest.split_at(e.valid_up_to());
                        out.push_str(std::str::from_utf8(valid).unwrap_or(""));
                        out.push('\u{7F}');
                        match e.error_len() {
                            Some(n) => rest = &after[n..],
                            // Truncated sequence at the end of input.
                            None => break,
                        }
                    }
                }
            }
            Cow::Owned(out)
        }
    }
}
