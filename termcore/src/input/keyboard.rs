// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Keyboard dispatch: control-byte canonicalization, CSI final-byte and
//! tilde-code tables, SS3 application-mode keys, and the Kitty `CSI u`
//! protocol.
//!
//! Canonicalization is deliberately lossy where the wire format is ambiguous:
//! `0x09` is Tab (not Ctrl+I), `0x0D`/`0x0A` are Enter (not Ctrl+M/J), `0x08`
//! and `0x7F` are Backspace (not Ctrl+H). Terminals send identical bytes for
//! both readings; the dedicated key wins.

use super::params::ParamBuf;
use super::types::{KeyCode, KeyEvent, Modifiers, RawEvent};

/// What a completed CSI sequence turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CsiOutcome {
    Event(RawEvent),
    /// `CSI 200 ~`: switch the decoder into paste accumulation.
    StartPaste,
    /// Recognized but deliberately ignored, or unknown final byte.
    Nothing,
}

/// Decode the CSI modifier parameter: `N` encodes bits `N - 1` with shift=1,
/// alt=2, ctrl=4.
#[must_use]
pub(crate) fn modifiers_from_param(n: u32) -> Modifiers {
    let bits = n.saturating_sub(1);
    Modifiers {
        shift: bits & 1 != 0,
        alt: bits & 2 != 0,
        ctrl: bits & 4 != 0,
    }
}

/// Canonicalize a C0 control byte (or DEL) into a key event.
///
/// `alt` is set when the byte arrived ESC-prefixed.
#[must_use]
pub(crate) fn control_key(byte: u8, alt: bool) -> KeyEvent {
    let with = |code: KeyCode, ctrl: bool| KeyEvent {
        code,
        modifiers: Modifiers {
            ctrl,
            alt,
            shift: false,
        },
    };
    match byte {
        0x09 => with(KeyCode::Tab, false),
        0x0A | 0x0D => with(KeyCode::Enter, false),
        0x08 | 0x7F => with(KeyCode::Backspace, false),
        0x1B => with(KeyCode::Escape, false),
        // Ctrl+Space sends NUL (Ctrl+@ on the wire).
        0x00 => with(KeyCode::Char(' '), true),
        0x01..=0x1A => with(KeyCode::Char((b'a' + byte - 1) as char), true),
        0x1C => with(KeyCode::Char('\\'), true),
        0x1D => with(KeyCode::Char(']'), true),
        0x1E => with(KeyCode::Char('^'), true),
        0x1F => with(KeyCode::Char('_'), true),
        // Printable bytes never reach here; keep the match total anyway.
        _ => with(KeyCode::Char(byte as char), false),
    }
}

/// Dispatch a CSI sequence on its final byte.
#[must_use]
pub(crate) fn dispatch_csi(final_byte: u8, params: &ParamBuf) -> CsiOutcome {
    let mods = modifiers_from_param(params.value_or(1, 1));
    let key = |code: KeyCode| {
        CsiOutcome::Event(RawEvent::Key(KeyEvent::new(code, mods)))
    };
    match final_byte {
        b'A' => key(KeyCode::Up),
        b'B' => key(KeyCode::Down),
        b'C' => key(KeyCode::Right),
        b'D' => key(KeyCode::Left),
        b'H' => key(KeyCode::Home),
        b'F' => key(KeyCode::End),
        // Shift+Tab; there is no dedicated BackTab key in the canonical model.
        b'Z' => CsiOutcome::Event(RawEvent::Key(KeyEvent::new(
            KeyCode::Tab,
            Modifiers::shift(),
        ))),
        b'I' => CsiOutcome::Event(RawEvent::Focus(true)),
        b'O' => CsiOutcome::Event(RawEvent::Focus(false)),
        b'~' => dispatch_tilde(params),
        b'u' => match dispatch_kitty(params) {
            Some(event) => CsiOutcome::Event(event),
            None => CsiOutcome::Nothing,
        },
        _ => CsiOutcome::Nothing,
    }
}

/// `CSI code ; modifiers ~` numeric-code table.
fn dispatch_tilde(params: &ParamBuf) -> CsiOutcome {
    let code = params.value(0);
    let mods = modifiers_from_param(params.value_or(1, 1));
    let key = |code: KeyCode| {
        CsiOutcome::Event(RawEvent::Key(KeyEvent::new(code, mods)))
    };
    match code {
        1 | 7 => key(KeyCode::Home),
        2 => key(KeyCode::Insert),
        3 => key(KeyCode::Delete),
        4 | 8 => key(KeyCode::End),
        5 => key(KeyCode::PageUp),
        6 => key(KeyCode::PageDown),
        // F1-F5 are 11-15; the VT-220 layout skips 16 and 22.
        11..=15 => key(KeyCode::Function(u8::try_from(code - 10).unwrap_or(1))),
        17..=21 => key(KeyCode::Function(u8::try_from(code - 11).unwrap_or(6))),
        23 => key(KeyCode::Function(11)),
        24 => key(KeyCode::Function(12)),
        200 => CsiOutcome::StartPaste,
        // The paste end marker outside a paste is noise.
        201 => CsiOutcome::Nothing,
        _ => CsiOutcome::Nothing,
    }
}

/// Kitty keyboard protocol: `CSI codepoint ; modifiers[:event_type] u`.
///
/// Release events (`event_type == 3`) are dropped. Private-use codepoints
/// 0xE000.. map to the special-key table; control-range codepoints
/// canonicalize the same way raw control bytes do.
fn dispatch_kitty(params: &ParamBuf) -> Option<RawEvent> {
    let event_type = params.sub(1, 1);
    if event_type == 3 {
        return None;
    }
    let mut mods = modifiers_from_param(params.value_or(1, 1));
    let codepoint = params.value(0);

    let code = match codepoint {
        9 => KeyCode::Tab,
        13 => KeyCode::Enter,
        27 => KeyCode::Escape,
        127 => KeyCode::Backspace,
        1..=26 => {
            mods.ctrl = true;
            #[allow(clippy::cast_possible_truncation)]
            let letter = (b'a' + (codepoint as u8) - 1) as char;
            KeyCode::Char(letter)
        }
        0xE000..=0xE0FF => kitty_functional_key(codepoint)?,
        _ => KeyCode::Char(char::from_u32(codepoint)?),
    };
    Some(RawEvent::Key(KeyEvent::new(code, mods)))
}

/// Kitty functional keys in the Unicode private-use area.
fn kitty_functional_key(codepoint: u32) -> Option<KeyCode> {
    match codepoint {
        0xE000 => Some(KeyCode::Escape),
        0xE001 => Some(KeyCode::Enter),
        0xE002 => Some(KeyCode::Tab),
        0xE003 => Some(KeyCode::Backspace),
        0xE004 => Some(KeyCode::Insert),
        0xE005 => Some(KeyCode::Delete),
        0xE006 => Some(KeyCode::Left),
        0xE007 => Some(KeyCode::Right),
        0xE008 => Some(KeyCode::Up),
        0xE009 => Some(KeyCode::Down),
        0xE00A => Some(KeyCode::PageUp),
        0xE00B => Some(KeyCode::PageDown),
        0xE00C => Some(KeyCode::Home),
        0xE00D => Some(KeyCode::End),
        0xE014..=0xE01F => {
            #[allow(clippy::cast_possible_truncation)]
            let n = (codepoint - 0xE014 + 1) as u8;
            Some(KeyCode::Function(n))
        }
        // Lock/menu keys and F13+ have no canonical representation.
        _ => None,
    }
}

/// SS3 (`ESC O`) single-byte dispatch: application-mode arrows, Home/End, and
/// F1-F4.
#[must_use]
pub(crate) fn dispatch_ss3(byte: u8) -> Option<RawEvent> {
    let code = match byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::Function(1),
        b'Q' => KeyCode::Function(2),
        b'R' => KeyCode::Function(3),
        b'S' => KeyCode::Function(4),
        _ => return None,
    };
    Some(RawEvent::Key(KeyEvent::plain(code)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(1, Modifiers::NONE)]
    #[test_case(2, Modifiers::shift())]
    #[test_case(3, Modifiers::alt())]
    #[test_case(5, Modifiers::ctrl())]
    #[test_case(8, Modifiers { ctrl: true, alt: true, shift: true })]
    fn modifier_param_encoding(n: u32, expected: Modifiers) {
        assert_eq!(modifiers_from_param(n), expected);
    }

    #[test]
    fn control_bytes_canonicalize() {
        assert_eq!(control_key(0x03, false), KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: Modifiers::ctrl(),
        });
        assert_eq!(control_key(0x09, false).code, KeyCode::Tab);
        assert_eq!(control_key(0x0D, false).code, KeyCode::Enter);
        assert_eq!(control_key(0x0A, false).code, KeyCode::Enter);
        assert_eq!(control_key(0x7F, false).code, KeyCode::Backspace);
        assert_eq!(control_key(0x00, false), KeyEvent {
            code: KeyCode::Char(' '),
            modifiers: Modifiers::ctrl(),
        });
    }

    #[test]
    fn tilde_function_keys_skip_vt220_gaps() {
        let mut params = ParamBuf::default();
        params.digit(b'1');
        params.digit(b'7');
        assert_eq!(
            dispatch_csi(b'~', &params),
            CsiOutcome::Event(RawEvent::Key(KeyEvent::plain(KeyCode::Function(6))))
        );
    }

    #[test]
    fn kitty_pua_maps_to_special_keys() {
        let mut params = ParamBuf::default();
        // 0xE014 = 57364 → F1.
        for b in b"57364" {
            params.digit(*b);
        }
        assert_eq!(
            dispatch_csi(b'u', &params),
            CsiOutcome::Event(RawEvent::Key(KeyEvent::plain(KeyCode::Function(1))))
        );
    }

    #[test]
    fn kitty_release_events_are_dropped() {
        let mut params = ParamBuf::default();
        // 97;1:3 u → 'a' release.
        params.digit(b'9');
        params.digit(b'7');
        params.next_param();
        params.digit(b'1');
        params.next_sub();
        params.digit(b'3');
        assert_eq!(dispatch_csi(b'u', &params), CsiOutcome::Nothing);
    }

    #[test]
    fn kitty_control_range_canonicalizes() {
        let mut params = ParamBuf::default();
        params.digit(b'3'); // codepoint 3 → Ctrl+C
        assert_eq!(
            dispatch_csi(b'u', &params),
            CsiOutcome::Event(RawEvent::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: Modifiers::ctrl(),
            }))
        );
    }

    #[test]
    fn csi_z_is_shift_tab() {
        let params = ParamBuf::default();
        assert_eq!(
            dispatch_csi(b'Z', &params),
            CsiOutcome::Event(RawEvent::Key(KeyEvent::new(
                KeyCode::Tab,
                Modifiers::shift()
            )))
        );
    }

    #[test]
    fn ss3_function_keys() {
        assert_eq!(
            dispatch_ss3(b'P'),
            Some(RawEvent::Key(KeyEvent::plain(KeyCode::Function(1))))
        );
        assert_eq!(dispatch_ss3(b'X'), None);
    }
}
