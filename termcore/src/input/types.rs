// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Input event types produced by the decoder.
//!
//! These are protocol-agnostic: by the time one of these exists, every
//! terminal-level encoding quirk (CSI vs SS3 arrows, `0x0D` vs `0x0A` Enter,
//! Alt as an ESC prefix, Ctrl as a masked control byte) has been canonicalized
//! away. The invariants:
//!
//! - Enter, Tab, Escape, Backspace are always the named key, never their raw
//!   control codes (13, 9, 27, 127/8).
//! - Ctrl+letter is always `Char('a'..'z')` with `ctrl`, never codes 1..26.
//! - Alt+anything is the underlying key with `alt`, never an ESC-prefixed pair.
//! - `Shift+Tab` (`CSI Z`) is Tab with `shift`.

use crate::units::{Pos, Size};

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
    };

    #[must_use]
    pub fn ctrl() -> Self {
        Modifiers {
            ctrl: true,
            ..Self::NONE
        }
    }

    #[must_use]
    pub fn alt() -> Self {
        Modifiers {
            alt: true,
            ..Self::NONE
        }
    }

    #[must_use]
    pub fn shift() -> Self {
        Modifiers {
            shift: true,
            ..Self::NONE
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { !self.ctrl && !self.alt && !self.shift }
}

/// A canonicalized key: either a printable codepoint or exactly one special
/// key, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// Regular printable character.
    Char(char),
    Escape,
    Enter,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function keys F1-F12.
    Function(u8),
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[must_use]
    pub fn plain(code: KeyCode) -> Self {
        KeyEvent {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        KeyEvent { code, modifiers }
    }
}

/// Mouse buttons and wheel directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    /// Any button came back up.
    Release,
    WheelUp,
    WheelDown,
    /// Motion, with or without a held button.
    Move,
}

/// A mouse event at a 0-based cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub pos: Pos,
    pub button: MouseButton,
    pub modifiers: Modifiers,
}

/// A decoded terminal input event.
///
/// `Paste` borrows the decoder's internal buffer: the slice is valid only
/// until the next `feed`/`reset`/`poll_event` call. Callers that retain paste
/// content must copy it out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(Size),
    Paste(&'a [u8]),
    Focus(bool),
}

/// Non-borrowing twin of [`Event`] used inside the decoder and event pump;
/// `Paste` is a marker resolved against the decoder's paste buffer at the
/// point the event is handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(Size),
    Paste,
    Focus(bool),
}
