//! Capability flags derived from fingerprinting.
//!
//! The mapping from identity to capabilities is table driven; the terminal
//! profiles in the fingerprinting test corpus are the reference for every
//! entry here. Each capability also carries a stable numeric code so
//! external consumers can query by number.

use bitflags::bitflags;

use crate::identity::TerminalKind;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CapabilitySet: u16 {
        /// Modifier postfix parameters on CSI sequences are parsed.
        const CSI_POSTFIX_MOD           = 1 << 0;
        /// Cursor shape sequences are worth attempting.
        const MAY_TRY_CURSOR_SHAPE      = 1 << 1;
        /// Title save/restore stack works.
        const TITLE_RESTORE             = 1 << 2;
        /// The bar variant of cursor shapes is safe to try.
        const MAY_TRY_CURSOR_SHAPE_BAR  = 1 << 3;
        /// Konsole-style OSC 50 cursor shape.
        const CURSOR_SHAPE_OSC50        = 1 << 4;
        /// Charset selection beyond the basic set.
        const EXTENDED_CHARSET          = 1 << 5;
        /// Truecolor sequences will not be misparsed.
        const TRUECOLOR_MAYBE_SUPPORTED = 1 << 6;
        /// Truecolor output is known to render.
        const TRUECOLOR_SUPPORTED       = 1 << 7;
        /// 88-color palette instead of 256.
        const COLOR_88                  = 1 << 8;
        /// Cleared cells keep their coloring.
        const CLEARED_COLORING          = 1 << 9;
        /// 7-bit ST terminates strings reliably.
        const SEVEN_BIT_ST              = 1 << 10;
        /// Tagged (bracketed) paste is worth enabling.
        const MAY_TRY_TAGGED_PASTE      = 1 << 11;
        /// Cleared coloring extends to the default background.
        const CLEARED_COLORING_DEFCOLOR = 1 << 12;
    }
}

impl CapabilitySet {
    /// Stable wire code of a single capability (1-based, declaration order).
    pub fn code_of(cap: CapabilitySet) -> Option<u8> {
        let i = cap.bits().trailing_zeros();
        (cap.bits().count_ones() == 1).then(|| i as u8 + 1)
    }

    /// Capability for a stable wire code.
    pub fn from_code(code: u8) -> Option<CapabilitySet> {
        if (1..=13).contains(&code) {
            CapabilitySet::from_bits(1 << (code - 1))
        } else {
            None
        }
    }
}

/// Inputs to the capability table beyond class and version.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CapSignals {
    /// A device-attribute (DA2) reply was received and parsed.
    pub da2_seen: bool,
    /// DA3 identified a Konsole new enough to use 7-bit ST.
    pub da3_kde: bool,
    /// The OSC 4 palette query for entry 255 was answered.
    pub osc4_answered: bool,
}

pub(crate) fn derive(kind: TerminalKind, version: u32, s: CapSignals) -> CapabilitySet {
    use CapabilitySet as C;
    use TerminalKind as K;

    let crippled = C::MAY_TRY_CURSOR_SHAPE_BAR
        | C::TRUECOLOR_MAYBE_SUPPORTED
        | C::CLEARED_COLORING
        | C::SEVEN_BIT_ST
        | C::CLEARED_COLORING_DEFCOLOR;
    let base = crippled | C::CSI_POSTFIX_MOD | C::MAY_TRY_CURSOR_SHAPE;
    let solid = base | C::EXTENDED_CHARSET | C::TRUECOLOR_SUPPORTED | C::MAY_TRY_TAGGED_PASTE;

    match kind {
        K::TooDumb | K::Misparsing => crippled,
        K::IncompatibleWithInput => crippled | C::EXTENDED_CHARSET,
        K::Base => {
            if s.da2_seen {
                base | C::EXTENDED_CHARSET
            } else {
                base
            }
        }
        K::Xterm => {
            let mut caps = C::CSI_POSTFIX_MOD
                | C::MAY_TRY_CURSOR_SHAPE
                | C::TITLE_RESTORE
                | C::EXTENDED_CHARSET
                | C::CLEARED_COLORING
                | C::SEVEN_BIT_ST
                | C::MAY_TRY_TAGGED_PASTE
                | C::CLEARED_COLORING_DEFCOLOR;
            if version >= 336 {
                caps |= C::MAY_TRY_CURSOR_SHAPE_BAR
                    | C::TRUECOLOR_MAYBE_SUPPORTED
                    | C::TRUECOLOR_SUPPORTED;
            }
            caps
        }
        K::Vte => {
            let mut caps = C::MAY_TRY_CURSOR_SHAPE_BAR
                | C::EXTENDED_CHARSET
                | C::CLEARED_COLORING
                | C::SEVEN_BIT_ST
                | C::MAY_TRY_TAGGED_PASTE;
            if version >= 3600 {
                caps |= C::TRUECOLOR_MAYBE_SUPPORTED | C::TRUECOLOR_SUPPORTED;
            }
            if version >= 4000 {
                caps |= C::MAY_TRY_CURSOR_SHAPE;
            }
            if version >= 5400 {
                caps |= C::CSI_POSTFIX_MOD | C::TITLE_RESTORE;
            }
            caps
        }
        K::Kitty | K::Mintty | K::Foot | K::UnknownFullFeatured | K::FullFeatured => {
            solid | C::TITLE_RESTORE
        }
        K::Konsole => {
            let mut caps = solid - C::SEVEN_BIT_ST | C::CURSOR_SHAPE_OSC50;
            if s.da3_kde {
                caps |= C::SEVEN_BIT_ST;
            }
            caps
        }
        K::Mlterm | K::Iterm2 => solid,
        K::Terminology => {
            if version >= 1_007_000 {
                solid | C::TITLE_RESTORE
            } else {
                solid
            }
        }
        K::Screen | K::AppleTerminal => {
            C::CSI_POSTFIX_MOD
                | C::MAY_TRY_CURSOR_SHAPE
                | C::MAY_TRY_CURSOR_SHAPE_BAR
                | C::EXTENDED_CHARSET
                | C::SEVEN_BIT_ST
                | C::CLEARED_COLORING_DEFCOLOR
        }
        K::Tmux | K::MicrosoftTerminal => solid - C::MAY_TRY_TAGGED_PASTE,
        K::Urxvt => {
            let mut caps = C::CSI_POSTFIX_MOD
                | C::MAY_TRY_CURSOR_SHAPE
                | C::MAY_TRY_CURSOR_SHAPE_BAR
                | C::EXTENDED_CHARSET
                | C::CLEARED_COLORING
                | C::CLEARED_COLORING_DEFCOLOR;
            if !s.osc4_answered {
                caps |= C::COLOR_88;
            }
            caps
        }
    }
}
