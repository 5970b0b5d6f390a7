//! Terminal identity: class tags, canonical sub-versions and the diagnostic
//! summary line.

/// Closed set of terminal classes the classifier can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Xterm,
    Vte,
    Kitty,
    Konsole,
    Mlterm,
    Terminology,
    Iterm2,
    Tmux,
    Urxvt,
    Screen,
    Mintty,
    AppleTerminal,
    MicrosoftTerminal,
    Foot,
    /// Answers the basic queries but carries no usable identity.
    Base,
    /// Does not even report the cursor position.
    TooDumb,
    /// Reports the cursor position but not device status; its input stream
    /// cannot be handled reliably.
    IncompatibleWithInput,
    /// Echoes parts of standard queries as literal text.
    Misparsing,
    /// Unrecognized DA3 id: by convention a promise of full compliance.
    UnknownFullFeatured,
    /// Caller vouched for a fully featured terminal.
    FullFeatured,
}

impl TerminalKind {
    pub fn display_name(self) -> &'static str {
        match self {
            TerminalKind::Xterm => "xterm",
            TerminalKind::Vte => "vte",
            TerminalKind::Kitty => "kitty",
            TerminalKind::Konsole => "konsole",
            TerminalKind::Mlterm => "mlterm",
            TerminalKind::Terminology => "terminology",
            TerminalKind::Iterm2 => "iterm2",
            TerminalKind::Tmux => "tmux",
            TerminalKind::Urxvt => "urxvt",
            TerminalKind::Screen => "screen",
            TerminalKind::Mintty => "mintty",
            TerminalKind::AppleTerminal => "apple terminal",
            TerminalKind::MicrosoftTerminal => "microsoft terminal",
            TerminalKind::Foot => "foot",
            TerminalKind::Base => "base",
            TerminalKind::TooDumb => "toodumb",
            TerminalKind::IncompatibleWithInput => "incompatible with input handling",
            TerminalKind::Misparsing => "misparsing",
            TerminalKind::UnknownFullFeatured => "unknown full featured",
            TerminalKind::FullFeatured => "full featured",
        }
    }
}

/// What fingerprinting decided about the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalIdentity {
    pub kind: TerminalKind,
    /// Canonicalized numeric sub-version, 0 when unknown.
    pub version: u32,
    /// The private cursor-position query was answered with the `?` marker.
    pub safe_cpr: bool,
    /// `CSI >` sequences are parsed (even if ignored) without echoing.
    pub seq_gt: bool,
    /// Same for `CSI =` sequences.
    pub seq_eq: bool,
}

impl TerminalIdentity {
    /// One-line summary for diagnostic logging, e.g.
    /// `Type: xterm(354) safe-CPR seq:>=`.
    pub fn summary(&self) -> String {
        format!(
            "Type: {}({}) {}seq:{}{}",
            self.kind.display_name(),
            self.version,
            if self.safe_cpr { "safe-CPR " } else { " " },
            if self.seq_gt { ">" } else { "" },
            if self.seq_eq { "=" } else { "" },
        )
    }
}

/// How dotted version strings collapse into one integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScheme {
    /// `yy.mm.p` date-style versions: two digits per field (Konsole, mintty).
    TwoDigit,
    /// `major.minor.patch`: three digits per field.
    ThreeDigit,
}

/// Collapse a dotted version like `3.9.3` to `3009003` or, with the
/// two-digit scheme, `23.08.1` to `230801`. Non-digit suffixes inside a
/// field are dropped (`3.3a` counts as `3.3`); fields too large for the
/// scheme contribute zero.
pub fn canonicalize_version(text: &str, scheme: VersionScheme) -> u32 {
    let (field_limit, f1, f2) = match scheme {
        VersionScheme::TwoDigit => (100, 10_000, 100),
        VersionScheme::ThreeDigit => (1000, 1_000_000, 1000),
    };
    let mut fields = [0u32; 3];
    for (i, part) in text.split('.').take(3).enumerate() {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        let value = digits.parse::<u32>().unwrap_or(0);
        fields[i] = if value < field_limit { value } else { 0 };
    }
    fields[0] * f1 + fields[1] * f2 + fields[2]
}

/// Parse a `DCS > | … ST` self report into a class and version when the
/// reporting software is recognized. The raw string is kept by the engine
/// either way.
pub(crate) fn parse_self_report(report: &str) -> Option<(TerminalKind, u32)> {
    fn parenthesized(report: &str, prefix: &str) -> Option<String> {
        let rest = report.strip_prefix(prefix)?;
        Some(rest.trim_end_matches(')').to_string())
    }

    if let Some(v) = parenthesized(report, "VTE(") {
        return Some((TerminalKind::Vte, v.parse().unwrap_or(0)));
    }
    if let Some(v) = parenthesized(report, "XTerm(") {
        return Some((TerminalKind::Xterm, v.parse().unwrap_or(0)));
    }
    if let Some(v) = parenthesized(report, "mlterm(") {
        return Some((
            TerminalKind::Mlterm,
            canonicalize_version(&v, VersionScheme::ThreeDigit),
        ));
    }
    if let Some(v) = report.strip_prefix("Konsole ") {
        return Some((
            TerminalKind::Konsole,
            canonicalize_version(v, VersionScheme::TwoDigit),
        ));
    }
    if let Some(v) = report.strip_prefix("terminology ") {
        return Some((
            TerminalKind::Terminology,
            canonicalize_version(v, VersionScheme::ThreeDigit),
        ));
    }
    if let Some(v) = report.strip_prefix("tmux ") {
        return Some((
            TerminalKind::Tmux,
            canonicalize_version(v, VersionScheme::ThreeDigit),
        ));
    }
    if let Some(v) = report.strip_prefix("iTerm2 ") {
        return Some((
            TerminalKind::Iterm2,
            canonicalize_version(v, VersionScheme::ThreeDigit),
        ));
    }
    if let Some(v) = report.strip_prefix("mintty ") {
        return Some((
            TerminalKind::Mintty,
            canonicalize_version(v, VersionScheme::TwoDigit),
        ));
    }
    None
}
