// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Terminal mode escape sequences emitted at backend init/deinit.
//!
//! Shared by both platforms: the Windows console accepts the same sequences
//! once `ENABLE_VIRTUAL_TERMINAL_PROCESSING` is on.

use super::{Capabilities, InitOptions};

pub(crate) const ENTER_ALT_SCREEN: &[u8] = b"\x1b[?1049h";
pub(crate) const LEAVE_ALT_SCREEN: &[u8] = b"\x1b[?1049l";
pub(crate) const HIDE_CURSOR: &[u8] = b"\x1b[?25l";
pub(crate) const SHOW_CURSOR: &[u8] = b"\x1b[?25h";
pub(crate) const ENABLE_SGR_MOUSE: &[u8] = b"\x1b[?1006h\x1b[?1003h";
pub(crate) const DISABLE_SGR_MOUSE: &[u8] = b"\x1b[?1003l\x1b[?1006l";
pub(crate) const ENABLE_BRACKETED_PASTE: &[u8] = b"\x1b[?2004h";
pub(crate) const DISABLE_BRACKETED_PASTE: &[u8] = b"\x1b[?2004l";
pub(crate) const ENABLE_FOCUS_EVENTS: &[u8] = b"\x1b[?1004h";
pub(crate) const DISABLE_FOCUS_EVENTS: &[u8] = b"\x1b[?1004l";
pub(crate) const SGR_RESET: &[u8] = b"\x1b[0m";
pub(crate) const CLEAR_AND_HOME: &[u8] = b"\x1b[2J\x1b[H";

/// Which optional modes a backend actually enabled, so deinit reverses
/// exactly those.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActiveModes {
    pub alt_screen: bool,
    pub cursor_hidden: bool,
    pub mouse: bool,
    pub bracketed_paste: bool,
    pub focus_events: bool,
}

impl ActiveModes {
    /// Decide what to enable from capabilities × options.
    pub fn plan(caps: Capabilities, options: InitOptions) -> Self {
        ActiveModes {
            alt_screen: true,
            cursor_hidden: true,
            mouse: caps.mouse && options.enable_mouse,
            bracketed_paste: caps.bracketed_paste && options.enable_bracketed_paste,
            focus_events: caps.focus_events && options.enable_focus_events,
        }
    }
}

/// The init byte stream: alternate screen, clear+home (init only), hidden
/// cursor, then the optional input modes.
pub(crate) fn enter_sequences(active: ActiveModes) -> Vec<u8> {
    let mut out = Vec::new();
    if active.alt_screen {
        out.extend_from_slice(ENTER_ALT_SCREEN);
    }
    out.extend_from_slice(CLEAR_AND_HOME);
    if active.cursor_hidden {
        out.extend_from_slice(HIDE_CURSOR);
    }
    if active.mouse {
        out.extend_from_slice(ENABLE_SGR_MOUSE);
    }
    if active.bracketed_paste {
        out.extend_from_slice(ENABLE_BRACKETED_PASTE);
    }
    if active.focus_events {
        out.extend_from_slice(ENABLE_FOCUS_EVENTS);
    }
    out
}

/// The deinit byte stream: reverse of [`enter_sequences`], plus a full SGR
/// reset so no attribute leaks into the shell.
pub(crate) fn exit_sequences(active: ActiveModes) -> Vec<u8> {
    let mut out = Vec::new();
    if active.focus_events {
        out.extend_from_slice(DISABLE_FOCUS_EVENTS);
    }
    if active.bracketed_paste {
        out.extend_from_slice(DISABLE_BRACKETED_PASTE);
    }
    if active.mouse {
        out.extend_from_slice(DISABLE_SGR_MOUSE);
    }
    out.extend_from_slice(SGR_RESET);
    if active.cursor_hidden {
        out.extend_from_slice(SHOW_CURSOR);
    }
    if active.alt_screen {
        out.extend_from_slice(LEAVE_ALT_SCREEN);
    }
    out
}
