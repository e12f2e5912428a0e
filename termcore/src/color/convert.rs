// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Color downgrade math: 24-bit → 256-entry palette → basic 8/16 → mono.
//!
//! The renderer calls [`downgrade`] on every emitted color so a cell authored
//! with [`Color::Rgb`] still shows something sensible on a `TERM=screen`
//! session. The mapping chain:
//!
//! ```text
//! Rgb(r,g,b) ──► 6×6×6 cube index 16 + 36r' + 6g' + b'   (r' = round(r·5/255))
//!          └──► grayscale ramp 232..=255 when the channels are near-equal
//! Indexed(n) ──► palette-expand to rgb ──► threshold to 0..=7, +8 when bright
//! anything   ──► Mono: default foreground above the luminance threshold,
//!                black ("none") below it
//! ```

use super::{Color, ColorDepth};

/// Channel spread below which an RGB value maps to the grayscale ramp instead
/// of the color cube.
const NEAR_GRAY_THRESHOLD: u16 = 30;

/// Luminance above which a color still draws on a mono terminal.
const MONO_LUMINANCE_THRESHOLD: u8 = 64;

/// Quantized levels of the xterm 6×6×6 color cube.
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// RGB values of palette indices 0..=15 (standard xterm).
const BASIC_PALETTE: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

/// Reduce `color` to something `depth` can display. Identity when it already
/// fits.
#[must_use]
pub fn downgrade(color: Color, depth: ColorDepth) -> Color {
    match depth {
        ColorDepth::TrueColor => color,
        ColorDepth::Color256 => match color {
            Color::Rgb(r, g, b) => Color::Indexed(rgb_to_ansi256(r, g, b)),
            other => other,
        },
        ColorDepth::Basic8 => match color {
            Color::Default => Color::Default,
            Color::Indexed(n) if n < 16 => Color::Indexed(n),
            Color::Indexed(n) => {
                let (r, g, b) = ansi256_to_rgb(n);
                Color::Indexed(rgb_to_basic16(r, g, b))
            }
            Color::Rgb(r, g, b) => Color::Indexed(rgb_to_basic16(r, g, b)),
        },
        ColorDepth::Mono => mono_downgrade(color),
    }
}

/// Mono terminals can only draw or not draw: colors above the luminance
/// threshold keep the default foreground, darker ones collapse to black.
fn mono_downgrade(color: Color) -> Color {
    let (r, g, b) = match color {
        Color::Default => return Color::Default,
        Color::Indexed(n) => ansi256_to_rgb(n),
        Color::Rgb(r, g, b) => (r, g, b),
    };
    if luminance(r, g, b) > MONO_LUMINANCE_THRESHOLD {
        Color::Default
    } else {
        Color::Indexed(0)
    }
}

/// Map 24-bit RGB onto the 256-entry palette.
///
/// Near-gray values go to the grayscale ramp (232..=255); everything else goes
/// to the 6×6×6 cube.
#[must_use]
pub fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    let spread = u16::from(r.abs_diff(g)) + u16::from(g.abs_diff(b))
        + u16::from(r.abs_diff(b));
    if spread < NEAR_GRAY_THRESHOLD {
        return gray_to_ramp(luminance(r, g, b));
    }
    let quant = |c: u8| -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        let level = ((u16::from(c) * 5) + 127) / 255;
        level as u8
    };
    16 + 36 * quant(r) + 6 * quant(g) + quant(b)
}

/// Map a gray level onto the 24-step ramp at 232..=255.
fn gray_to_ramp(level: u8) -> u8 {
    // Ramp entries are 8, 18, 28, .. 238.
    if level < 8 {
        return 16; // cube black is darker than ramp start
    }
    if level > 243 {
        return 231; // cube white is brighter than ramp end
    }
    232 + (level - 8) / 10
}

/// Expand a palette index to its standard xterm RGB value.
#[must_use]
pub fn ansi256_to_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0..=15 => BASIC_PALETTE[usize::from(index)],
        16..=231 => {
            let n = index - 16;
            let r = CUBE_LEVELS[usize::from(n / 36)];
            let g = CUBE_LEVELS[usize::from((n % 36) / 6)];
            let b = CUBE_LEVELS[usize::from(n % 6)];
            (r, g, b)
        }
        232..=255 => {
            let level = 8 + 10 * (index - 232);
            (level, level, level)
        }
    }
}

/// Map RGB onto the 16 basic colors.
///
/// Each primary channel is thresholded at half the most saturated channel to
/// pick one of the 8 base hues; brightness ≥ 128 selects the bright variant.
#[must_use]
pub fn rgb_to_basic16(r: u8, g: u8, b: u8) -> u8 {
    let max = r.max(g).max(b);
    if max < 32 {
        return 0; // black
    }
    let threshold = max / 2;
    let mut index = 0u8;
    if r > threshold {
        index |= 1;
    }
    if g > threshold {
        index |= 2;
    }
    if b > threshold {
        index |= 4;
    }
    if luminance(r, g, b) >= 128 { index + 8 } else { index }
}

/// Integer approximation of perceptual luminance.
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    #[allow(clippy::cast_possible_truncation)]
    let value =
        (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
    value as u8
}
