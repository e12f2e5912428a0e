// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Escape-sequence emission into a byte buffer.
//!
//! Everything here is infallible: sequences are appended to a `Vec<u8>`
//! scratch buffer that the renderer writes out row by row. Cursor positioning
//! is `CSI row ; col H` with 1-based indices; colors use `30..37`/`90..97`
//! (and the 40/100 background forms) for the 16 basic colors, `38;5;N` for
//! indexed, and `38;2;R;G;B` for 24-bit.

use crate::color::{Attributes, Color};

/// SGR codes for each attribute bit, in emission order.
const ATTRIBUTE_CODES: [(Attributes, u8); 7] = [
    (Attributes::BOLD, 1),
    (Attributes::DIM, 2),
    (Attributes::ITALIC, 3),
    (Attributes::UNDERLINE, 4),
    (Attributes::BLINK, 5),
    (Attributes::REVERSE, 7),
    (Attributes::STRIKETHROUGH, 9),
];

pub(crate) fn push_decimal(buf: &mut Vec<u8>, value: u32) {
    if value == 0 {
        buf.push(b'0');
        return;
    }
    let mut digits = [0u8; 10];
    let mut n = value;
    let mut i = digits.len();
    while n > 0 {
        i -= 1;
        digits[i] = b'0' + u8::try_from(n % 10).unwrap_or(0);
        n /= 10;
    }
    buf.extend_from_slice(&digits[i..]);
}

/// `CSI row ; col H`, converting from 0-based to the wire's 1-based indices.
pub(crate) fn cursor_move(buf: &mut Vec<u8>, col: u16, row: u16) {
    buf.extend_from_slice(b"\x1b[");
    push_decimal(buf, u32::from(row) + 1);
    buf.push(b';');
    push_decimal(buf, u32::from(col) + 1);
    buf.push(b'H');
}

/// `CSI 0 m`.
pub(crate) fn sgr_reset(buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"\x1b[0m");
}

/// Emit one SGR code per attribute bit present in `attrs`.
pub(crate) fn sgr_attributes(buf: &mut Vec<u8>, attrs: Attributes) {
    for (flag, code) in ATTRIBUTE_CODES {
        if attrs.contains(flag) {
            buf.extend_from_slice(b"\x1b[");
            push_decimal(buf, u32::from(code));
            buf.push(b'm');
        }
    }
}

/// Foreground color change. The color must already be downgraded to the
/// terminal's depth.
pub(crate) fn sgr_foreground(buf: &mut Vec<u8>, color: Color) {
    sgr_color(buf, color, false);
}

/// Background color change. Same downgrade contract as the foreground.
pub(crate) fn sgr_background(buf: &mut Vec<u8>, color: Color) {
    sgr_color(buf, color, true);
}

fn sgr_color(buf: &mut Vec<u8>, color: Color, background: bool) {
    buf.extend_from_slice(b"\x1b[");
    match color {
        Color::Default => {
            push_decimal(buf, if background { 49 } else { 39 });
        }
        Color::Indexed(n @ 0..=7) => {
            let base: u32 = if background { 40 } else { 30 };
            push_decimal(buf, base + u32::from(n));
        }
        Color::Indexed(n @ 8..=15) => {
            let base: u32 = if background { 100 } else { 90 };
            push_decimal(buf, base + u32::from(n - 8));
        }
        Color::Indexed(n) => {
            buf.extend_from_slice(if background { b"48;5;" } else { b"38;5;" });
            push_decimal(buf, u32::from(n));
        }
        Color::Rgb(r, g, b) => {
            buf.extend_from_slice(if background { b"48;2;" } else { b"38;2;" });
            push_decimal(buf, u32::from(r));
            buf.push(b';');
            push_decimal(buf, u32::from(g));
            buf.push(b';');
            push_decimal(buf, u32::from(b));
        }
    }
    buf.push(b'm');
}
