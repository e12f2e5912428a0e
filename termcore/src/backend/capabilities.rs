// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Terminal capability detection from the environment.
//!
//! There is no terminfo parsing here: detection is a substring match on
//! `$TERM` plus `$COLORTERM`, with a conservative fallback (basic color, no
//! mouse/paste/focus) for anything unrecognized. Applications and tests can
//! force a color depth through [`global_color_depth`], which also memoizes
//! the detection so the render loop never pays for environment lookups.

use std::env;

use crate::color::ColorDepth;

/// Terminals known to support SGR mouse, bracketed paste, and focus events.
/// Substring-matched against `$TERM`.
const MODERN_TERMS: &[&str] = &[
    "xterm",
    "rxvt",
    "screen",
    "tmux",
    "kitty",
    "alacritty",
    "iterm2",
    "wezterm",
    "foot",
    "vte",
    "gnome",
    "konsole",
    "ghostty",
];

/// What the terminal on the other end can do. Detected once at backend init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub color_depth: ColorDepth,
    pub mouse: bool,
    pub bracketed_paste: bool,
    pub focus_events: bool,
}

impl Capabilities {
    /// The conservative fallback for an unknown `$TERM`.
    #[must_use]
    pub fn conservative() -> Self {
        Capabilities {
            color_depth: ColorDepth::Basic8,
            mouse: false,
            bracketed_paste: false,
            focus_events: false,
        }
    }
}

/// Detect capabilities from `$TERM` / `$COLORTERM`. Color depth goes through
/// [`global_color_depth::detect`] so overrides apply.
#[must_use]
pub fn detect_capabilities() -> Capabilities {
    let term = env::var("TERM").unwrap_or_default();
    let modern = MODERN_TERMS.iter().any(|needle| term.contains(needle));
    let caps = Capabilities {
        color_depth: global_color_depth::detect(),
        mouse: modern,
        bracketed_paste: modern,
        focus_events: modern,
    };
    tracing::debug!(?caps, %term, "detected terminal capabilities");
    caps
}

/// Color depth from the environment alone (no override/cache).
#[must_use]
pub fn examine_env_for_color_depth() -> ColorDepth {
    let term = env::var("TERM").unwrap_or_default();
    if term.contains("mono") {
        return ColorDepth::Mono;
    }
    if let Ok(colorterm) = env::var("COLORTERM")
        && (colorterm.contains("truecolor") || colorterm.contains("24bit"))
    {
        return ColorDepth::TrueColor;
    }
    if term.contains("256color") {
        return ColorDepth::Color256;
    }
    ColorDepth::Basic8
}

/// Process-global color depth override and detection cache.
///
/// Priority in [`detect`](global_color_depth::detect): explicit override,
/// then the memoized detection result, then a fresh environment probe (whose
/// result is cached).
pub mod global_color_depth {
    use std::sync::atomic::{AtomicI8, Ordering};

    use super::examine_env_for_color_depth;
    use crate::color::ColorDepth;

    static OVERRIDE: AtomicI8 = AtomicI8::new(NOT_SET);
    static CACHED: AtomicI8 = AtomicI8::new(NOT_SET);

    const NOT_SET: i8 = -1;

    fn encode(depth: ColorDepth) -> i8 {
        match depth {
            ColorDepth::Mono => 0,
            ColorDepth::Basic8 => 1,
            ColorDepth::Color256 => 2,
            ColorDepth::TrueColor => 3,
        }
    }

    fn decode(value: i8) -> Option<ColorDepth> {
        match value {
            0 => Some(ColorDepth::Mono),
            1 => Some(ColorDepth::Basic8),
            2 => Some(ColorDepth::Color256),
            3 => Some(ColorDepth::TrueColor),
            _ => None,
        }
    }

    /// Resolve the color depth: override, else cache, else environment.
    #[must_use]
    pub fn detect() -> ColorDepth {
        if let Some(depth) = decode(OVERRIDE.load(Ordering::Acquire)) {
            return depth;
        }
        if let Some(depth) = decode(CACHED.load(Ordering::Acquire)) {
            return depth;
        }
        let depth = examine_env_for_color_depth();
        CACHED.store(encode(depth), Ordering::Release);
        depth
    }

    /// Like [`detect`], but fall back to `default` instead of probing the
    /// environment. Used on Windows, where `$TERM` is usually absent and the
    /// modern console is a safe assumption.
    #[must_use]
    pub fn detect_or(default: ColorDepth) -> ColorDepth {
        match decode(OVERRIDE.load(Ordering::Acquire)) {
            Some(depth) => depth,
            None => default,
        }
    }

    /// Force a depth regardless of the environment (testing, user config).
    pub fn set_override(depth: ColorDepth) {
        OVERRIDE.store(encode(depth), Ordering::Release);
    }

    pub fn clear_override() { OVERRIDE.store(NOT_SET, Ordering::Release); }

    /// Drop the memoized detection so the next [`detect`] re-probes.
    pub fn clear_cache() { CACHED.store(NOT_SET, Ordering::Release); }
}
