// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The byte-serial input state machine.
//!
//! ```text
//! raw bytes ──► Decoder::feed(byte) ──► Option<Event>
//!
//!                    ┌──────── 0x1B ────────┐
//!                    ▼                      │
//!   Ground ──────► Escape ──'['──► CSI ──► CSIParam ──final──► dispatch
//!     │              │ 'O'          │'<'                          │
//!     │              ▼              ▼                             ▼
//!     │             SS3          MouseSGR                   Key / Mouse /
//!     │                             │'M'                    Focus / paste
//!     │ ≥0x80                    MouseX10                       start
//!     ▼                                                           │
//!   Utf8 / Utf8Alt                Paste ◄─────────────────────────┘
//! ```
//!
//! One byte in, at most one event out. Sequences the machine does not
//! recognize are dropped by silently resetting to Ground; a malformed escape
//! must never kill the event stream. The only error [`feed`] can return is
//! [`PasteOverflow`], and the decoder stays usable after it.
//!
//! [`feed`]: Decoder::feed
//! [`PasteOverflow`]: crate::TermCoreError::PasteOverflow

use smallvec::SmallVec;

use super::keyboard::{CsiOutcome, control_key, dispatch_csi, dispatch_ss3};
use super::mouse::{decode_sgr_mouse, decode_x10_mouse};
use super::params::ParamBuf;
use super::paste::{PasteBuffer, PasteStep};
use super::types::{Event, KeyCode, KeyEvent, Modifiers, RawEvent};
use super::utf8::{Utf8Acc, Utf8Step};
use crate::error::TermCoreError;

/// Decoder state. One variant per wire-format context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    /// Seen a bare ESC; the next byte decides.
    Escape,
    /// Seen `ESC [`; nothing accumulated yet.
    Csi,
    /// Accumulating CSI parameters.
    CsiParam,
    /// Seen `ESC O`.
    Ss3,
    /// Seen `ESC [ <`; accumulating SGR mouse parameters.
    MouseSgr,
    /// Seen `ESC [ M`; collecting the three X10 data bytes.
    MouseX10 { cb: u8, x: u8, len: u8 },
    /// Inside a bracketed paste.
    Paste,
    /// Accumulating a multi-byte codepoint.
    Utf8,
    /// Same, for an ESC-prefixed (Alt) codepoint.
    Utf8Alt,
}

/// Byte-at-a-time decoder for terminal input.
///
/// Feed raw bytes with [`feed`](Self::feed); each call yields at most one
/// canonicalized [`Event`]. When the caller has no more bytes and
/// [`is_pending`](Self::is_pending) is true, it should wait for its escape
/// timeout and then call [`reset`](Self::reset), which yields the bare Escape
/// key if one was being held back.
#[derive(Debug)]
pub struct Decoder {
    state: State,
    params: ParamBuf,
    intermediates: SmallVec<[u8; 4]>,
    /// Private-prefix byte (`?`, `=`, `>`) remembered for the sequence.
    private_marker: Option<u8>,
    utf8: Option<Utf8Acc>,
    paste: PasteBuffer,
}

impl Default for Decoder {
    fn default() -> Self { Decoder::new() }
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Decoder {
            state: State::Ground,
            params: ParamBuf::default(),
            intermediates: SmallVec::new(),
            private_marker: None,
            utf8: None,
            paste: PasteBuffer::new(),
        }
    }

    /// Feed one byte.
    ///
    /// A returned [`Event::Paste`] borrows this decoder's buffer and is valid
    /// only until the next `feed`/`reset` call.
    ///
    /// # Errors
    ///
    /// [`TermCoreError::PasteOverflow`] when a paste body exceeds the cap; the
    /// decoder remains usable and will silently consume the rest of the
    /// oversized paste.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Event<'_>>, TermCoreError> {
        let raw = self.feed_raw(byte)?;
        Ok(raw.map(|r| self.materialize(r)))
    }

    /// Whether the machine is mid-sequence and the caller should wait for
    /// more bytes (or time out).
    #[must_use]
    pub fn is_pending(&self) -> bool { self.state != State::Ground }

    /// Abandon any partial sequence. Returns the bare Escape key if one was
    /// pending (the caller's escape timeout expired).
    pub fn reset(&mut self) -> Option<Event<'static>> {
        let was_escape = matches!(self.state, State::Escape);
        self.state = State::Ground;
        self.utf8 = None;
        self.params.clear();
        self.intermediates.clear();
        self.private_marker = None;
        if was_escape {
            Some(Event::Key(KeyEvent::plain(KeyCode::Escape)))
        } else {
            None
        }
    }

    /// The most recent completed paste body. Valid until the next paste
    /// begins.
    #[must_use]
    pub fn paste_bytes(&self) -> &[u8] { self.paste.bytes() }

    /// Resolve a [`RawEvent`] against this decoder's buffers.
    pub(crate) fn materialize(&self, raw: RawEvent) -> Event<'_> {
        match raw {
            RawEvent::Key(k) => Event::Key(k),
            RawEvent::Mouse(m) => Event::Mouse(m),
            RawEvent::Resize(s) => Event::Resize(s),
            RawEvent::Focus(f) => Event::Focus(f),
            RawEvent::Paste => Event::Paste(self.paste.bytes()),
        }
    }

    /// State machine core. Identical to [`feed`](Self::feed) but the paste
    /// event comes back as a marker, so callers can loop without holding a
    /// borrow.
    pub(crate) fn feed_raw(
        &mut self,
        byte: u8,
    ) -> Result<Option<RawEvent>, TermCoreError> {
        match self.state {
            State::Ground => Ok(self.on_ground(byte)),
            State::Escape => Ok(self.on_escape(byte)),
            State::Csi => Ok(self.on_csi_entry(byte)),
            State::CsiParam => Ok(self.on_csi_param(byte)),
            State::Ss3 => {
                self.state = State::Ground;
                Ok(dispatch_ss3(byte))
            }
            State::MouseSgr => Ok(self.on_mouse_sgr(byte)),
            State::MouseX10 { cb, x, len } => Ok(self.on_mouse_x10(byte, cb, x, len)),
            State::Paste => self.on_paste(byte),
            State::Utf8 => self.on_utf8(byte, false),
            State::Utf8Alt => self.on_utf8(byte, true),
        }
    }

    fn on_ground(&mut self, byte: u8) -> Option<RawEvent> {
        match byte {
            0x1B => {
                self.state = State::Escape;
                None
            }
            0x00..=0x1F | 0x7F => Some(RawEvent::Key(control_key(byte, false))),
            0x20..=0x7E => Some(RawEvent::Key(KeyEvent::plain(KeyCode::Char(
                byte as char,
            )))),
            _ => {
                match Utf8Acc::start(byte) {
                    Some(acc) => {
                        self.utf8 = Some(acc);
                        self.state = State::Utf8;
                    }
                    None => {
                        tracing::debug!(byte, "dropping stray non-UTF-8 byte");
                    }
                }
                None
            }
        }
    }

    fn on_escape(&mut self, byte: u8) -> Option<RawEvent> {
        match byte {
            b'[' => {
                self.begin_csi();
                self.state = State::Csi;
                None
            }
            b'O' => {
                self.state = State::Ss3;
                None
            }
            // ESC ESC: emit one bare Escape, keep waiting on the second.
            0x1B => Some(RawEvent::Key(KeyEvent::plain(KeyCode::Escape))),
            0x00..=0x1A | 0x1C..=0x1F | 0x7F => {
                self.state = State::Ground;
                Some(RawEvent::Key(control_key(byte, true)))
            }
            0x20..=0x7E => {
                self.state = State::Ground;
                Some(RawEvent::Key(KeyEvent::new(
                    KeyCode::Char(byte as char),
                    Modifiers::alt(),
                )))
            }
            _ => {
                // Alt + multi-byte codepoint.
                match Utf8Acc::start(byte) {
                    Some(acc) => {
                        self.utf8 = Some(acc);
                        self.state = State::Utf8Alt;
                    }
                    None => {
                        self.state = State::Ground;
                        tracing::debug!(byte, "dropping malformed Alt sequence");
                    }
                }
                None
            }
        }
    }

    fn begin_csi(&mut self) {
        self.params.clear();
        self.intermediates.clear();
        self.private_marker = None;
    }

    fn on_csi_entry(&mut self, byte: u8) -> Option<RawEvent> {
        match byte {
            b'<' => {
                self.state = State::MouseSgr;
                None
            }
            b'M' => {
                self.state = State::MouseX10 { cb: 0, x: 0, len: 0 };
                None
            }
            b'?' | b'=' | b'>' => {
                self.private_marker = Some(byte);
                self.state = State::CsiParam;
                None
            }
            _ => self.on_csi_param(byte),
        }
    }

    fn on_csi_param(&mut self, byte: u8) -> Option<RawEvent> {
        match byte {
            b'0'..=b'9' => {
                self.params.digit(byte);
                self.state = State::CsiParam;
                None
            }
            b';' => {
                self.params.next_param();
                self.state = State::CsiParam;
                None
            }
            b':' => {
                self.params.next_sub();
                self.state = State::CsiParam;
                None
            }
            0x20..=0x2F => {
                if self.intermediates.len() < self.intermediates.inline_size() {
                    self.intermediates.push(byte);
                }
                self.state = State::CsiParam;
                None
            }
            0x40..=0x7E => {
                self.state = State::Ground;
                self.on_csi_final(byte)
            }
            _ => {
                tracing::debug!(byte, "invalid byte inside CSI; dropping sequence");
                self.state = State::Ground;
                None
            }
        }
    }

    fn on_csi_final(&mut self, final_byte: u8) -> Option<RawEvent> {
        // Private-prefixed sequences are terminal status responses, not input.
        if self.private_marker.is_some() {
            return None;
        }
        match dispatch_csi(final_byte, &self.params) {
            CsiOutcome::Event(event) => Some(event),
            CsiOutcome::StartPaste => {
                self.paste.begin();
                self.state = State::Paste;
                None
            }
            CsiOutcome::Nothing => None,
        }
    }

    fn on_mouse_sgr(&mut self, byte: u8) -> Option<RawEvent> {
        match byte {
            b'0'..=b'9' => {
                self.params.digit(byte);
                None
            }
            b';' => {
                self.params.next_param();
                None
            }
            b'M' | b'm' => {
                self.state = State::Ground;
                decode_sgr_mouse(&self.params, byte == b'M')
            }
            _ => {
                self.state = State::Ground;
                None
            }
        }
    }

    fn on_mouse_x10(&mut self, byte: u8, cb: u8, x: u8, len: u8) -> Option<RawEvent> {
        match len {
            0 => {
                self.state = State::MouseX10 { cb: byte, x: 0, len: 1 };
                None
            }
            1 => {
                self.state = State::MouseX10 { cb, x: byte, len: 2 };
                None
            }
            _ => {
                self.state = State::Ground;
                decode_x10_mouse(cb, x, byte)
            }
        }
    }

    fn on_paste(&mut self, byte: u8) -> Result<Option<RawEvent>, TermCoreError> {
        match self.paste.feed(byte) {
            Ok(PasteStep::Continue) => Ok(None),
            Ok(PasteStep::Finished { overflowed }) => {
                self.state = State::Ground;
                if overflowed {
                    Ok(None)
                } else {
                    Ok(Some(RawEvent::Paste))
                }
            }
            Err(e) => Err(e),
        }
    }

    fn on_utf8(
        &mut self,
        byte: u8,
        alt: bool,
    ) -> Result<Option<RawEvent>, TermCoreError> {
        let Some(acc) = self.utf8.as_mut() else {
            // Unreachable by construction; recover anyway.
            self.state = State::Ground;
            return Ok(None);
        };
        match acc.push(byte) {
            Utf8Step::Continue => Ok(None),
            Utf8Step::Done(ch) => {
                self.state = State::Ground;
                self.utf8 = None;
                let modifiers = if alt { Modifiers::alt() } else { Modifiers::NONE };
                Ok(Some(RawEvent::Key(KeyEvent::new(
                    KeyCode::Char(ch),
                    modifiers,
                ))))
            }
            Utf8Step::Reject => {
                // The byte was not consumed: reprocess it from Ground.
                self.state = State::Ground;
                self.utf8 = None;
                self.feed_raw(byte)
            }
            Utf8Step::Malformed => {
                self.state = State::Ground;
                self.utf8 = None;
                tracing::debug!("dropping malformed UTF-8 sequence");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::types::{MouseButton, MouseEvent};
    use crate::units::Pos;
    use pretty_assertions::assert_eq;

    /// Owned twin of [`Event`] so tests can collect across feeds.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Owned {
        Key(KeyEvent),
        Mouse(MouseEvent),
        Paste(Vec<u8>),
        Focus(bool),
    }

    fn feed_bytes(decoder: &mut Decoder, bytes: &[u8]) -> Vec<Owned> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(event) = decoder.feed(b).expect("no overflow in tests") {
                out.push(match event {
                    Event::Key(k) => Owned::Key(k),
                    Event::Mouse(m) => Owned::Mouse(m),
                    Event::Paste(p) => Owned::Paste(p.to_vec()),
                    Event::Focus(f) => Owned::Focus(f),
                    Event::Resize(_) => unreachable!("decoder never resizes"),
                });
            }
        }
        out
    }

    fn key(code: KeyCode) -> Owned { Owned::Key(KeyEvent::plain(code)) }

    #[test]
    fn arrow_then_ctrl_c() {
        // 1B 5B 41 03 decodes to Up, then Ctrl+C.
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, &[0x1B, 0x5B, 0x41, 0x03]);
        assert_eq!(events, vec![
            key(KeyCode::Up),
            Owned::Key(KeyEvent::new(KeyCode::Char('c'), Modifiers::ctrl())),
        ]);
    }

    #[test]
    fn all_arrow_encodings_decode_plain() {
        for (bytes, code) in [
            (&b"\x1b[A"[..], KeyCode::Up),
            (&b"\x1b[B"[..], KeyCode::Down),
            (&b"\x1b[C"[..], KeyCode::Right),
            (&b"\x1b[D"[..], KeyCode::Left),
            (&b"\x1bOA"[..], KeyCode::Up),
            (&b"\x1bOB"[..], KeyCode::Down),
            (&b"\x1bOC"[..], KeyCode::Right),
            (&b"\x1bOD"[..], KeyCode::Left),
        ] {
            let mut d = Decoder::new();
            assert_eq!(feed_bytes(&mut d, bytes), vec![key(code)], "{bytes:?}");
        }
    }

    #[test]
    fn modified_arrow() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[1;5A");
        assert_eq!(events, vec![Owned::Key(KeyEvent::new(
            KeyCode::Up,
            Modifiers::ctrl()
        ))]);
    }

    #[test]
    fn alt_backspace() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, &[0x1B, 0x7F]);
        assert_eq!(events, vec![Owned::Key(KeyEvent::new(
            KeyCode::Backspace,
            Modifiers::alt()
        ))]);
    }

    #[test]
    fn alt_letter() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1bb");
        assert_eq!(events, vec![Owned::Key(KeyEvent::new(
            KeyCode::Char('b'),
            Modifiers::alt()
        ))]);
    }

    #[test]
    fn esc_esc_emits_bare_escape_and_stays_pending() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, &[0x1B, 0x1B]);
        assert_eq!(events, vec![key(KeyCode::Escape)]);
        assert!(d.is_pending());
        assert_eq!(
            d.reset(),
            Some(Event::Key(KeyEvent::plain(KeyCode::Escape)))
        );
        assert!(!d.is_pending());
    }

    #[test]
    fn sgr_mouse_press() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[<0;10;20M");
        assert_eq!(events, vec![Owned::Mouse(MouseEvent {
            pos: Pos::new(9, 19),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        })]);
    }

    #[test]
    fn x10_mouse_press() {
        let mut d = Decoder::new();
        let mut bytes = b"\x1b[M".to_vec();
        bytes.extend_from_slice(&[32, 33 + 4, 33 + 2]);
        let events = feed_bytes(&mut d, &bytes);
        assert_eq!(events, vec![Owned::Mouse(MouseEvent {
            pos: Pos::new(4, 2),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        })]);
    }

    #[test]
    fn focus_events() {
        let mut d = Decoder::new();
        assert_eq!(feed_bytes(&mut d, b"\x1b[I"), vec![Owned::Focus(true)]);
        assert_eq!(feed_bytes(&mut d, b"\x1b[O"), vec![Owned::Focus(false)]);
    }

    #[test]
    fn bracketed_paste_round_trip() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[200~XYZ\x1b[201~");
        assert_eq!(events, vec![Owned::Paste(b"XYZ".to_vec())]);
        assert!(!d.is_pending());
    }

    #[test]
    fn paste_with_embedded_partial_end_marker() {
        // The partial end-marker prefix is flushed back into the body.
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[200~abc\x1b[201 def\x1b[201~");
        assert_eq!(events, vec![Owned::Paste(b"abc\x1b[201 def".to_vec())]);
    }

    #[test]
    fn utf8_text() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, "é中".as_bytes());
        assert_eq!(events, vec![
            key(KeyCode::Char('é')),
            key(KeyCode::Char('中')),
        ]);
    }

    #[test]
    fn alt_utf8_codepoint() {
        let mut d = Decoder::new();
        let mut bytes = vec![0x1B];
        bytes.extend_from_slice("é".as_bytes());
        let events = feed_bytes(&mut d, &bytes);
        assert_eq!(events, vec![Owned::Key(KeyEvent::new(
            KeyCode::Char('é'),
            Modifiers::alt()
        ))]);
    }

    #[test]
    fn invalid_utf8_continuation_reprocesses_byte() {
        let mut d = Decoder::new();
        // 0xC3 expects a continuation; 'A' is not one. The 'A' must not be
        // lost.
        let events = feed_bytes(&mut d, &[0xC3, b'A']);
        assert_eq!(events, vec![key(KeyCode::Char('A'))]);
    }

    #[test]
    fn kitty_csi_u_roundtrip() {
        let mut d = Decoder::new();
        // ESC [ 99 ; 5 u → Ctrl+c via the Kitty protocol ('c' is 99).
        let events = feed_bytes(&mut d, b"\x1b[99;5u");
        assert_eq!(events, vec![Owned::Key(KeyEvent::new(
            KeyCode::Char('c'),
            Modifiers::ctrl()
        ))]);
    }

    #[test]
    fn private_csi_sequences_are_dropped() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[?2004h\x1b[A");
        assert_eq!(events, vec![key(KeyCode::Up)]);
    }

    #[test]
    fn unknown_final_byte_drops_sequence() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[5q*");
        assert_eq!(events, vec![key(KeyCode::Char('*'))]);
    }

    #[test]
    fn shift_tab() {
        let mut d = Decoder::new();
        let events = feed_bytes(&mut d, b"\x1b[Z");
        assert_eq!(events, vec![Owned::Key(KeyEvent::new(
            KeyCode::Tab,
            Modifiers::shift()
        ))]);
    }

    #[test]
    fn function_keys_via_tilde_table() {
        for (bytes, n) in [
            (&b"\x1b[11~"[..], 1u8),
            (b"\x1b[15~", 5),
            (b"\x1b[17~", 6),
            (b"\x1b[21~", 10),
            (b"\x1b[23~", 11),
            (b"\x1b[24~", 12),
        ] {
            let mut d = Decoder::new();
            assert_eq!(
                feed_bytes(&mut d, bytes),
                vec![key(KeyCode::Function(n))],
                "{bytes:?}"
            );
        }
    }

    #[test]
    fn reset_without_pending_escape_returns_none() {
        let mut d = Decoder::new();
        feed_bytes(&mut d, b"\x1b[");
        assert!(d.is_pending());
        assert_eq!(d.reset(), None);
        assert!(!d.is_pending());
    }
}
