//! The fingerprinting state machine.
//!
//! Probes go out in small batches, each closed by a synchronizing fence the
//! terminal is known to answer (`CSI 6n`, or `CSI 5n` after the private
//! cursor query, whose reply would be shape-ambiguous with a position
//! fence). Replies are matched against the expected-reply queue of the
//! current batch; a reply that fits a later slot finalizes every skipped
//! slot as unanswered. Position drift at a fence is junk the preceding
//! probe echoed into the screen; the engine backspaces over exactly those
//! columns and overwrites them with spaces.
//!
//! Probing is adaptive:
//! - a DA2 reply to `CSI > 1 c` confirms a legacy VTE, whose remaining
//!   probes are known to echo junk and are skipped;
//! - a Konsole-style double reply to `CSI > 0 ; 1 c` confirms Konsole;
//! - junk on `CSI = c` switches to cautious mode, skipping every probe that
//!   is not strictly needed (this is also why the color query never reaches
//!   the BSD console terminals that cannot parse it);
//! - the terminfo-name query is only sent to terminals that answered the
//!   private cursor query, which filters out everyone who would echo it.
//!
//! The engine never blocks: the caller pumps bytes in via
//! [`Fingerprinter::add_input_data`] and watches [`Fingerprinter::state`].

use crate::caps::{self, CapSignals, CapabilitySet};
use crate::identity::{parse_self_report, TerminalIdentity, TerminalKind};
use crate::tokens::{Token, Tokenizer};

/// Where probe bytes (and glitch patches) are written.
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]);
}

impl ByteSink for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl ByteSink for std::rc::Rc<std::cell::RefCell<Vec<u8>>> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.borrow_mut().extend_from_slice(bytes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectState {
    Idle,
    Running,
    Finished,
    /// Classification could not complete within the input budget.
    Failed,
}

/// Input bytes accepted while running before giving up.
const MAX_INPUT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Initial,
    Da2Retry,
    Da2Explicit,
    Da3,
    PrivateCpr,
    NameQuery,
    TermParams,
    ColorQuery,
    TnQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Want {
    /// `CSI 0 n` device status report.
    Dsr,
    /// Plain cursor position report used as a fence.
    Fence,
    /// DA2 reply (or a DA1-shaped alias).
    Da2,
    /// DA3 reply (`DCS ! | hex ST`) or a DA1-shaped alias.
    Da3,
    /// `CSI ? … R`, the private cursor report. Plain reports do not match.
    PrivateCpr,
    /// `DCS > | name ST` self report.
    Name,
    /// `CSI … x` terminal parameters report.
    TermParams,
    /// OSC 4 palette reply.
    Color,
    /// `DCS 1 + r … ST` terminfo answer.
    Tn,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    want: Want,
    answered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suspect {
    None,
    LegacyVte,
    Konsole,
    Apple,
}

pub struct Fingerprinter<S: ByteSink> {
    sink: S,
    tokenizer: Tokenizer,
    state: DetectState,
    stage: Stage,
    queue: Vec<Slot>,
    qpos: usize,
    consumed: usize,
    /// Predicted cursor position (0-based), from the last fence.
    pos: Option<(i32, i32)>,

    suspect: Suspect,
    dsr_ok: bool,
    cpr_ok: bool,
    da2: Option<(i32, i32, i32)>,
    da2_alias: bool,
    da2_retry_answered: bool,
    da2_explicit_double: bool,
    da3: Option<u32>,
    da3_alias: bool,
    safe_cpr: bool,
    name: Option<String>,
    term_params_answered: bool,
    term_params_128: bool,
    osc4_answered: bool,
    tn: Option<String>,

    legacy_vte: bool,
    cautious: bool,
    initial_junk: bool,
    glitch_patched: bool,
    seq_gt: bool,
    seq_eq: bool,

    identity: Option<TerminalIdentity>,
    capabilities: CapabilitySet,
}

impl<S: ByteSink> Fingerprinter<S> {
    pub fn new(sink: S) -> Self {
        Fingerprinter {
            sink,
            tokenizer: Tokenizer::new(),
            state: DetectState::Idle,
            stage: Stage::Initial,
            queue: Vec::new(),
            qpos: 0,
            consumed: 0,
            pos: None,
            suspect: Suspect::None,
            dsr_ok: false,
            cpr_ok: false,
            da2: None,
            da2_alias: false,
            da2_retry_answered: false,
            da2_explicit_double: false,
            da3: None,
            da3_alias: false,
            safe_cpr: false,
            name: None,
            term_params_answered: false,
            term_params_128: false,
            osc4_answered: false,
            tn: None,
            legacy_vte: false,
            cautious: false,
            initial_junk: false,
            glitch_patched: false,
            seq_gt: true,
            seq_eq: true,
            identity: None,
            capabilities: CapabilitySet::empty(),
        }
    }

    /// Emit the first probe batch and start consuming replies.
    pub fn start(&mut self) {
        if self.state != DetectState::Idle {
            return;
        }
        self.state = DetectState::Running;
        self.enter(Stage::Initial);
    }

    pub fn state(&self) -> DetectState {
        self.state
    }

    pub fn identity(&self) -> Option<&TerminalIdentity> {
        self.identity.as_ref()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn self_reported_name_and_version(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Probe fragments leaked into the screen and were overwritten.
    pub fn needs_glitch_patching(&self) -> bool {
        self.glitch_patched
    }

    /// Deliver terminal input. Unrelated bytes are ignored; the engine picks
    /// replies out of the stream and never blocks.
    pub fn add_input_data(&mut self, data: &[u8]) {
        if self.state != DetectState::Running {
            return;
        }
        for &byte in data {
            self.consumed += 1;
            if self.consumed > MAX_INPUT {
                tracing::warn!("fingerprinting ran off autodetect; giving up");
                self.state = DetectState::Failed;
                return;
            }
            if let Some(token) = self.tokenizer.push(byte) {
                self.on_token(token);
                if self.state != DetectState::Running {
                    return;
                }
            }
        }
    }

    // ---- probe emission ---------------------------------------------------

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.qpos = 0;
        let (bytes, wants): (&[u8], &[Want]) = match stage {
            Stage::Initial => (
                b"\x1b[5n\x1b[6n\x1b[>c\x1b[5n\x1b[6n",
                &[Want::Dsr, Want::Fence, Want::Da2, Want::Dsr, Want::Fence],
            ),
            Stage::Da2Retry => (b"\x1b[>1c\x1b[6n", &[Want::Da2, Want::Fence]),
            Stage::Da2Explicit => (b"\x1b[>0;1c\x1b[6n", &[Want::Da2, Want::Fence]),
            Stage::Da3 => (b"\x1b[=c\x1b[6n", &[Want::Da3, Want::Fence]),
            Stage::PrivateCpr => (b"\x1b[?6n\x1b[5n", &[Want::PrivateCpr, Want::Dsr]),
            Stage::NameQuery => (b"\x1b[>q\x1b[6n", &[Want::Name, Want::Fence]),
            Stage::TermParams => (b"\x1b[1x\x1b[6n", &[Want::TermParams, Want::Fence]),
            Stage::ColorQuery => (b"\x1b]4;255;?\x07\x1b[6n", &[Want::Color, Want::Fence]),
            Stage::TnQuery => (b"\x1bP+q544e\x1b\\\x1b[6n", &[Want::Tn, Want::Fence]),
        };
        self.queue = wants
            .iter()
            .map(|&want| Slot {
                want,
                answered: false,
            })
            .collect();
        self.sink.write_bytes(bytes);
    }

    // ---- reply matching ---------------------------------------------------

    fn on_token(&mut self, token: Token) {
        if let Token::Byte(byte) = &token {
            tracing::trace!(byte = *byte, "non-reply input during fingerprinting");
            return;
        }
        let found = (self.qpos..self.queue.len())
            .find(|&i| shape_matches(self.queue[i].want, &token));
        let Some(i) = found else {
            self.on_unexpected(token);
            return;
        };
        self.queue[i].answered = true;
        self.qpos = i + 1;
        self.record(i, token);
        if self.state != DetectState::Running {
            return;
        }
        self.check_stage_complete();
    }

    fn on_unexpected(&mut self, token: Token) {
        match &token {
            Token::Csi {
                private: Some('>'),
                final_byte: 'c',
                ..
            } if self.stage == Stage::Da2Explicit => {
                // Konsole answers the two-parameter DA2 retry twice.
                self.da2_explicit_double = true;
            }
            Token::Csi {
                private: None,
                final_byte: 'R',
                ..
            } => {
                // Late position report from a probe answered with a plain
                // CPR; position tracking already covered it.
                tracing::trace!("surplus cursor position report ignored");
            }
            _ => tracing::debug!(?token, "unmatched terminal reply during fingerprinting"),
        }
    }

    fn record(&mut self, slot: usize, token: Token) {
        match self.stage {
            Stage::Initial => match slot {
                0 => self.dsr_ok = true,
                1 => {
                    self.cpr_ok = true;
                    if let Token::Csi { params, .. } = &token {
                        self.pos = parse_cpr(params);
                    }
                }
                2 => {
                    if let Token::Csi {
                        private, params, ..
                    } = &token
                    {
                        match private {
                            Some('>') => self.da2 = Some(parse_numbers(params)),
                            _ => self.da2_alias = true,
                        }
                    }
                }
                3 => {}
                4 => {
                    if let Token::Csi { params, .. } = &token {
                        self.note_fence_position(params);
                    }
                }
                _ => {}
            },
            _ => {
                if slot == 0 {
                    self.record_probe_reply(token);
                } else if self.queue[slot].want == Want::Fence {
                    if let Token::Csi { params, .. } = &token {
                        self.note_fence_position(params);
                    }
                }
            }
        }
    }

    fn record_probe_reply(&mut self, token: Token) {
        match self.stage {
            Stage::Da2Retry => {
                if let Token::Csi {
                    private: Some('>'), ..
                } = &token
                {
                    self.da2_retry_answered = true;
                }
            }
            Stage::Da2Explicit => {}
            Stage::Da3 => match &token {
                Token::Dcs(data) => self.da3 = parse_da3(data),
                Token::Csi { .. } => {
                    // DA1-shaped alias: `CSI =` is misparsed as plain DA.
                    self.da3_alias = true;
                    self.seq_eq = false;
                }
                _ => {}
            },
            Stage::PrivateCpr => self.safe_cpr = true,
            Stage::NameQuery => {
                if let Token::Dcs(data) = &token {
                    self.name = Some(String::from_utf8_lossy(&data[2..]).into_owned());
                }
            }
            Stage::TermParams => {
                if let Token::Csi { params, .. } = &token {
                    self.term_params_answered = true;
                    let fields: Vec<i32> =
                        params.split(';').map(|f| f.parse().unwrap_or(0)).collect();
                    self.term_params_128 =
                        fields.get(3) == Some(&128) && fields.get(4) == Some(&128);
                }
            }
            Stage::ColorQuery => self.osc4_answered = true,
            Stage::TnQuery => {
                if let Token::Dcs(data) = &token {
                    self.tn = parse_tn(data);
                }
            }
            Stage::Initial => {}
        }
    }

    // ---- fences and glitch patching --------------------------------------

    fn note_fence_position(&mut self, params: &str) {
        let Some((x, y)) = parse_cpr(params) else {
            return;
        };
        if let Some((px, py)) = self.pos {
            if (x, y) != (px, py) {
                self.glitch_patched = true;
                if y == py && x > px {
                    let n = (x - px) as usize;
                    let mut patch = vec![0x08u8; n];
                    patch.extend(std::iter::repeat(b' ').take(n));
                    self.sink.write_bytes(&patch);
                } else {
                    tracing::warn!("probe junk crossed a line boundary; columns not patched");
                }
                match self.stage {
                    Stage::Initial => self.initial_junk = true,
                    Stage::Da3 => {
                        self.cautious = true;
                        self.seq_eq = false;
                    }
                    _ => self.cautious = true,
                }
                tracing::debug!(stage = ?self.stage, "probe junk detected and patched");
            }
        }
        self.pos = Some((x, y));
    }

    // ---- stage sequencing -------------------------------------------------

    fn check_stage_complete(&mut self) {
        if self.stage == Stage::Initial {
            // Slots: 0 dsr, 1 cpr (baseline), 2 da2, 3 dsr fence, 4 cpr fence.
            // A fence can only answer if its first occurrence did; once no
            // pending fence can answer, the stage is final.
            let q = &self.queue;
            let complete = q[4].answered
                || (q[3].answered && !q[1].answered)
                || (self.qpos > 2 && !q[0].answered && !q[1].answered);
            if complete {
                self.finish_initial();
            }
        } else if self.qpos == self.queue.len() {
            self.finish_stage();
        }
    }

    fn finish_initial(&mut self) {
        if self.initial_junk || !self.cpr_ok || self.da2_alias || !self.dsr_ok {
            return self.classify();
        }
        match self.da2 {
            None => self.enter(Stage::PrivateCpr),
            Some((pp, pv, pc)) => {
                if pp == 1 && pv >= 2500 && pc == 0 {
                    self.suspect = Suspect::LegacyVte;
                    self.enter(Stage::Da2Retry);
                } else if pv == 115 {
                    self.suspect = Suspect::Konsole;
                    self.enter(Stage::Da2Retry);
                } else if pp == 1 && pv == 95 && pc == 0 {
                    self.suspect = Suspect::Apple;
                    self.enter(Stage::Da2Retry);
                } else {
                    self.enter(Stage::Da3);
                }
            }
        }
    }

    fn finish_stage(&mut self) {
        match self.stage {
            Stage::Initial => unreachable!("initial stage has its own completion"),
            Stage::Da2Retry => {
                if self.da2_retry_answered && self.suspect == Suspect::LegacyVte {
                    // Old VTE parses `CSI > 1 c` as a plain DA2 request; its
                    // remaining probes would all echo junk.
                    self.legacy_vte = true;
                    self.seq_gt = false;
                    self.seq_eq = false;
                    self.enter(Stage::PrivateCpr);
                } else if self.da2_retry_answered && self.suspect == Suspect::Konsole {
                    self.enter(Stage::Da2Explicit);
                } else {
                    self.enter(Stage::Da3);
                }
            }
            Stage::Da2Explicit => self.enter(Stage::Da3),
            Stage::Da3 => self.enter(Stage::PrivateCpr),
            Stage::PrivateCpr => {
                if self.legacy_vte || self.cautious {
                    self.classify();
                } else {
                    self.enter(Stage::NameQuery);
                }
            }
            Stage::NameQuery => self.enter(Stage::TermParams),
            Stage::TermParams => self.enter(Stage::ColorQuery),
            Stage::ColorQuery => {
                // The terminfo query is only safe on terminals that proved
                // they parse private-marker queries.
                if self.safe_cpr {
                    self.enter(Stage::TnQuery);
                } else {
                    self.classify();
                }
            }
            Stage::TnQuery => self.classify(),
        }
    }

    // ---- classification ---------------------------------------------------

    fn classify(&mut self) {
        let (mut kind, mut version) = self.decide();
        if let Some(report) = &self.name {
            if let Some((k, v)) = parse_self_report(report) {
                if k == kind || kind == TerminalKind::Base {
                    kind = k;
                    if v > 0 {
                        version = v;
                    }
                }
            }
        }
        if matches!(
            kind,
            TerminalKind::TooDumb | TerminalKind::IncompatibleWithInput | TerminalKind::Misparsing
        ) {
            self.seq_gt = false;
            self.seq_eq = false;
        }
        let signals = CapSignals {
            da2_seen: self.da2.is_some(),
            da3_kde: self.da3 == Some(0x7E4B_4445),
            osc4_answered: self.osc4_answered,
        };
        self.capabilities = caps::derive(kind, version, signals);
        let identity = TerminalIdentity {
            kind,
            version,
            safe_cpr: self.safe_cpr,
            seq_gt: self.seq_gt,
            seq_eq: self.seq_eq,
        };
        tracing::debug!(summary = %identity.summary(), "terminal fingerprinting finished");
        self.identity = Some(identity);
        self.state = DetectState::Finished;
    }

    fn decide(&self) -> (TerminalKind, u32) {
        use TerminalKind as K;
        if self.initial_junk {
            return (K::Misparsing, 0);
        }
        if !self.cpr_ok || self.da2_alias {
            return (K::TooDumb, 0);
        }
        if !self.dsr_ok {
            return (K::IncompatibleWithInput, 0);
        }
        let (pp, pv, pc) = self.da2.unwrap_or((-1, 0, 0));
        if self.legacy_vte {
            return (K::Vte, pv as u32);
        }
        match self.tn.as_deref() {
            Some("xterm-kitty") => return (K::Kitty, pc as u32),
            Some("mlterm") => return (K::Mlterm, 0),
            Some("iTerm2") => return (K::Iterm2, 0),
            _ => {}
        }
        if self.da2_explicit_double && pv == 115 {
            let version = if self.da3 == Some(0x7E4B_4445) { 220_370 } else { 0 };
            return (K::Konsole, version);
        }
        match self.da3 {
            // "~VTE"
            Some(0x7E56_5445) => return (K::Vte, pv as u32),
            // "~KDE": first shipped by Konsole 22.03.70.
            Some(0x7E4B_4445) => return (K::Konsole, 220_370),
            // "~~TY"
            Some(0x7E7E_5459) => return (K::Terminology, 0),
            // Any unknown nonzero id promises a fully featured terminal.
            Some(v) if v != 0 => return (K::UnknownFullFeatured, 0),
            _ => {}
        }
        match pp {
            41 => return (K::Xterm, pv as u32),
            83 => return (K::Screen, pv as u32),
            84 => return (K::Tmux, 0),
            85 => return (K::Urxvt, 0),
            77 => return (K::Mintty, pv as u32),
            65 => return (K::Vte, pv as u32),
            _ => {}
        }
        if pp == 0 && pv == 10 && pc == 1 && self.da3 == Some(0) {
            return (K::MicrosoftTerminal, 0);
        }
        if pp == 1
            && pv == 95
            && pc == 0
            && self.da3_alias
            && self.term_params_answered
            && !self.da2_retry_answered
        {
            return (K::AppleTerminal, 0);
        }
        if pp == 0 && self.term_params_128 {
            // Legacy xterm: DA2 with a zero machine id, but the terminal
            // parameters report carries xterm's 128-byte buffers.
            return (K::Xterm, pv as u32);
        }
        (K::Base, 0)
    }
}

fn shape_matches(want: Want, token: &Token) -> bool {
    match (want, token) {
        (
            Want::Dsr,
            Token::Csi {
                private: None,
                params,
                final_byte: 'n',
            },
        ) => params == "0",
        (
            Want::Fence,
            Token::Csi {
                private: None,
                final_byte: 'R',
                ..
            },
        ) => true,
        (
            Want::Da2,
            Token::Csi {
                private: Some('>') | Some('?'),
                final_byte: 'c',
                ..
            },
        ) => true,
        (Want::Da3, Token::Dcs(data)) => data.starts_with(b"!|"),
        (
            Want::Da3,
            Token::Csi {
                private: Some('?'),
                final_byte: 'c',
                ..
            },
        ) => true,
        (
            Want::PrivateCpr,
            Token::Csi {
                private: Some('?'),
                final_byte: 'R',
                ..
            },
        ) => true,
        (Want::Name, Token::Dcs(data)) => data.starts_with(b">|"),
        (
            Want::TermParams,
            Token::Csi {
                private: None,
                final_byte: 'x',
                ..
            },
        ) => true,
        (Want::Color, Token::Osc(data)) => data.starts_with(b"4;"),
        (Want::Tn, Token::Dcs(data)) => data.starts_with(b"1+r") || data.starts_with(b"0+r"),
        _ => false,
    }
}

/// Parse a cursor position report payload (`row;col[;1]`) to 0-based (x, y).
fn parse_cpr(params: &str) -> Option<(i32, i32)> {
    let mut fields = params.split(';');
    let row: i32 = fields.next()?.parse().ok()?;
    let col: i32 = fields.next()?.parse().ok()?;
    Some((col - 1, row - 1))
}

fn parse_numbers(params: &str) -> (i32, i32, i32) {
    let mut fields = params.split(';').map(|f| f.parse::<i32>().unwrap_or(0));
    (
        fields.next().unwrap_or(0),
        fields.next().unwrap_or(0),
        fields.next().unwrap_or(0),
    )
}

/// DA3 payload after `!|`: up to eight hex digits.
fn parse_da3(data: &[u8]) -> Option<u32> {
    let hex = std::str::from_utf8(&data[2..]).ok()?;
    if hex.is_empty() || hex.len() > 8 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Terminfo reply `1+r544e=<hex name>`; `0+r` reports failure.
fn parse_tn(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    let rest = text.strip_prefix("1+r")?;
    let (id, hex) = rest.split_once('=')?;
    if !id.eq_ignore_ascii_case("544e") {
        return None;
    }
    let mut name = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for pair in bytes.chunks(2) {
        let s = std::str::from_utf8(pair).ok()?;
        name.push(u8::from_str_radix(s, 16).ok()?);
    }
    String::from_utf8(name).ok()
}
