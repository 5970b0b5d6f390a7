//! Session-level wiring: fingerprinting through the session API and the
//! restore-string plumbing.

use std::cell::RefCell;
use std::rc::Rc;

use core_probe::{CapabilitySet, DetectState, TerminalKind};
use core_surface::Color;
use core_terminal::{TerminalSession, DEFAULT_RESTORE};

/// Minimal scripted terminal: answers the probes an xterm 336 would,
/// tracking no cursor movement (the position is always the home cell).
fn respond_like_xterm_336(session: &mut TerminalSession<Rc<RefCell<Vec<u8>>>>, sink: &Rc<RefCell<Vec<u8>>>) {
    let replies: &[(&[u8], &[u8])] = &[
        (b"\x1b[5n", b"\x1b[0n"),
        (b"\x1b[6n", b"\x1b[1;1R"),
        (b"\x1b[>c", b"\x1b[>41;336;0c"),
        (b"\x1b[>0;1c", b"\x1b[>41;336;0c"),
        (b"\x1b[=c", b"\x1bP!|00000000\x1b\\"),
        (b"\x1b[?6n", b"\x1b[?1;1;1R"),
        (b"\x1b[>q", b""),
        (b"\x1b[1x", b""),
        (b"\x1b]4;255;?\x07", b"\x1b]4;255;rgb:eeee/eeee/eeee\x07"),
        (b"\x1bP+q544e\x1b\\", b""),
        (b"\x1b[>1c", b""),
    ];
    loop {
        let pending: Vec<u8> = sink.borrow_mut().drain(..).collect();
        if pending.is_empty() {
            break;
        }
        let mut rest: &[u8] = &pending;
        while !rest.is_empty() {
            let (probe, reply) = replies
                .iter()
                .find(|(probe, _)| rest.starts_with(probe))
                .expect("scripted reply for every probe");
            rest = &rest[probe.len()..];
            if !reply.is_empty() {
                session.add_input_data(reply);
            }
        }
    }
}

#[test]
fn session_detects_and_exposes_capabilities() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let sink: Rc<RefCell<Vec<u8>>> = Rc::default();
    let mut session = TerminalSession::new(sink.clone(), 80, 24);
    assert_eq!(session.auto_detect_state(), DetectState::Idle);

    session.start_auto_detect();
    respond_like_xterm_336(&mut session, &sink);

    assert_eq!(session.auto_detect_state(), DetectState::Finished);
    let identity = session.identity().expect("identity");
    assert_eq!(identity.kind, TerminalKind::Xterm);
    assert_eq!(identity.version, 336);
    assert_eq!(
        session.identity_text().as_deref(),
        Some("Type: xterm(336) safe-CPR seq:>=")
    );
    assert!(session.capable(CapabilitySet::TRUECOLOR_SUPPORTED));
    assert!(session.capable(CapabilitySet::TITLE_RESTORE));
    assert!(!session.capable(CapabilitySet::COLOR_88));
    assert!(!session.needs_glitch_patching());
}

#[test]
fn surface_is_usable_through_the_session() {
    let sink: Rc<RefCell<Vec<u8>>> = Rc::default();
    let mut session = TerminalSession::new(sink, 40, 10);
    session
        .surface_mut()
        .write_with_colors(1, 1, "hi", Color::RED, Color::Default);
    let (text, _, _) = session.surface().peek_text(1, 1).unwrap();
    assert_eq!(text, "h");
}

#[test]
fn restore_string_defaults_and_updates() {
    let sink: Rc<RefCell<Vec<u8>>> = Rc::default();
    let mut session = TerminalSession::new(sink, 40, 10);
    assert_eq!(session.restore_string(), DEFAULT_RESTORE);
    session.set_restore_string("\u{1b}[0m");
    assert_eq!(session.restore_string(), "\u{1b}[0m");
    session.shutdown();
}
