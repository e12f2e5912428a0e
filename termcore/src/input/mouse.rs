// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Mouse decoding: SGR (1006) and the legacy X10 fallback.
//!
//! SGR is `CSI < Cb ; x ; y M|m` with 1-based decimal coordinates: press on
//! `M`, release on `m`. X10 is `CSI M` followed by three raw bytes, each
//! offset by 32. Both share the `Cb` bit layout: buttons in the low bits,
//! motion at 32, wheel at 64, and shift/alt/ctrl at 4/8/16.

use super::types::{Modifiers, MouseButton, MouseEvent, RawEvent};
use crate::input::params::ParamBuf;
use crate::units::Pos;

/// Modifier bits carried in `Cb`.
fn mouse_modifiers(cb: u32) -> Modifiers {
    Modifiers {
        shift: cb & 4 != 0,
        alt: cb & 8 != 0,
        ctrl: cb & 16 != 0,
    }
}

/// Button classification shared by both protocols. `None` for combinations we
/// do not recognize.
fn mouse_button(cb: u32, press: bool) -> Option<MouseButton> {
    if !press {
        return Some(MouseButton::Release);
    }
    if cb & 32 != 0 {
        return Some(MouseButton::Move);
    }
    match cb & 0x43 {
        0 => Some(MouseButton::Left),
        1 => Some(MouseButton::Middle),
        2 => Some(MouseButton::Right),
        64 => Some(MouseButton::WheelUp),
        65 => Some(MouseButton::WheelDown),
        _ => None,
    }
}

/// Decode a completed SGR sequence. `press` distinguishes the `M`/`m` finals.
#[must_use]
pub(crate) fn decode_sgr_mouse(params: &ParamBuf, press: bool) -> Option<RawEvent> {
    let cb = params.value(0);
    let col = params.value_or(1, 1).saturating_sub(1);
    let row = params.value_or(2, 1).saturating_sub(1);
    let button = mouse_button(cb, press)?;
    Some(RawEvent::Mouse(MouseEvent {
        pos: Pos::new(clamp_u16(col), clamp_u16(row)),
        button,
        modifiers: mouse_modifiers(cb),
    }))
}

/// Decode the three data bytes of an X10 sequence.
#[must_use]
pub(crate) fn decode_x10_mouse(cb_byte: u8, x_byte: u8, y_byte: u8) -> Option<RawEvent> {
    let cb = u32::from(cb_byte.saturating_sub(32));
    // X10 encodes release as button bits 3, not with a distinct final byte.
    let (cb, press) = if cb & 0x43 == 3 { (cb & !0x43, false) } else { (cb, true) };
    let button = mouse_button(cb, press)?;
    Some(RawEvent::Mouse(MouseEvent {
        pos: Pos::new(
            u16::from(x_byte.saturating_sub(33)),
            u16::from(y_byte.saturating_sub(33)),
        ),
        button,
        modifiers: mouse_modifiers(cb),
    }))
}

fn clamp_u16(value: u32) -> u16 {
    #[allow(clippy::cast_possible_truncation)]
    let clamped = value.min(u32::from(u16::MAX)) as u16;
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::types::MouseButton;
    use pretty_assertions::assert_eq;

    fn params(text: &str) -> ParamBuf {
        let mut p = ParamBuf::default();
        for byte in text.bytes() {
            match byte {
                b'0'..=b'9' => p.digit(byte),
                b';' => p.next_param(),
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn sgr_left_press_is_zero_based() {
        let event = decode_sgr_mouse(&params("0;10;20"), true);
        assert_eq!(
            event,
            Some(RawEvent::Mouse(MouseEvent {
                pos: Pos::new(9, 19),
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            }))
        );
    }

    #[test]
    fn sgr_release_final_wins_over_button_bits() {
        let event = decode_sgr_mouse(&params("0;1;1"), false);
        assert!(matches!(
            event,
            Some(RawEvent::Mouse(MouseEvent {
                button: MouseButton::Release,
                ..
            }))
        ));
    }

    #[test]
    fn sgr_wheel_and_motion() {
        assert!(matches!(
            decode_sgr_mouse(&params("64;5;5"), true),
            Some(RawEvent::Mouse(MouseEvent {
                button: MouseButton::WheelUp,
                ..
            }))
        ));
        assert!(matches!(
            decode_sgr_mouse(&params("65;5;5"), true),
            Some(RawEvent::Mouse(MouseEvent {
                button: MouseButton::WheelDown,
                ..
            }))
        ));
        // 32 + 0: left-button drag reports as motion.
        assert!(matches!(
            decode_sgr_mouse(&params("32;5;5"), true),
            Some(RawEvent::Mouse(MouseEvent {
                button: MouseButton::Move,
                ..
            }))
        ));
    }

    #[test]
    fn sgr_modifier_bits() {
        let event = decode_sgr_mouse(&params("16;1;1"), true);
        assert!(matches!(
            event,
            Some(RawEvent::Mouse(MouseEvent {
                button: MouseButton::Left,
                modifiers: Modifiers { ctrl: true, .. },
                ..
            }))
        ));
    }

    #[test]
    fn x10_press_and_release() {
        // Cb byte 32 → cb 0 → left press; coordinates 33-offset.
        let press = decode_x10_mouse(32, 33 + 9, 33 + 19);
        assert_eq!(
            press,
            Some(RawEvent::Mouse(MouseEvent {
                pos: Pos::new(9, 19),
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            }))
        );
        // Cb byte 35 → cb 3 → release.
        assert!(matches!(
            decode_x10_mouse(35, 33, 33),
            Some(RawEvent::Mouse(MouseEvent {
                button: MouseButton::Release,
                ..
            }))
        ));
    }
}
