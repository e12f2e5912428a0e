// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Windows console backend.
//!
//! Input comes from `ReadConsoleInputW` records rather than a byte stream:
//! character payloads (including VT sequences produced by
//! `ENABLE_VIRTUAL_TERMINAL_INPUT`) are re-encoded as UTF-8 and run through
//! the shared [`Decoder`], while non-character keys are translated directly
//! through a virtual-key table. UTF-16 surrogate pairs are buffered across
//! records. Buffer-size records become `Resize`, focus records are gated by
//! the init option, and mouse records are translated from the legacy
//! structure so applications see the same [`Event`] stream as on POSIX.
//!
//! Output goes through `WriteFile` with `ENABLE_VIRTUAL_TERMINAL_PROCESSING`
//! on and the output code page forced to UTF-8; both are restored at deinit.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use windows_sys::Win32::Foundation::{
    HANDLE, INVALID_HANDLE_VALUE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Storage::FileSystem::WriteFile;
use windows_sys::Win32::System::Console::{
    CONSOLE_SCREEN_BUFFER_INFO, ENABLE_ECHO_INPUT, ENABLE_EXTENDED_FLAGS,
    ENABLE_LINE_INPUT, ENABLE_MOUSE_INPUT, ENABLE_PROCESSED_INPUT,
    ENABLE_PROCESSED_OUTPUT, ENABLE_QUICK_EDIT_MODE, ENABLE_VIRTUAL_TERMINAL_INPUT,
    ENABLE_VIRTUAL_TERMINAL_PROCESSING, ENABLE_WINDOW_INPUT, FOCUS_EVENT,
    GetConsoleCP, GetConsoleMode, GetConsoleOutputCP, GetConsoleScreenBufferInfo,
    GetNumberOfConsoleInputEvents, GetStdHandle, INPUT_RECORD, KEY_EVENT, MOUSE_EVENT,
    ReadConsoleInputW, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE, SetConsoleCP,
    SetConsoleMode, SetConsoleOutputCP, WINDOW_BUFFER_SIZE_EVENT,
};
use windows_sys::Win32::System::Threading::WaitForSingleObject;

use super::sequences::{self, ActiveModes};
use super::{Backend, Capabilities, InitOptions, global_color_depth};
use crate::error::{TermCoreError, TermCoreResult};
use crate::input::{
    Decoder, Event, KeyCode, KeyEvent, Modifiers, MouseButton, MouseEvent, RawEvent,
};
use crate::units::{Pos, Size};

/// UTF-8 code page identifier (`Win32::Globalization::CP_UTF8`).
const CP_UTF8: u32 = 65001;

// Virtual-key codes mirroring the special-key table. Kept local so the
// Globalization/KeyboardAndMouse feature surface stays out of the build.
const VK_BACK: u16 = 0x08;
const VK_TAB: u16 = 0x09;
const VK_RETURN: u16 = 0x0D;
const VK_ESCAPE: u16 = 0x1B;
const VK_PRIOR: u16 = 0x21;
const VK_NEXT: u16 = 0x22;
const VK_END: u16 = 0x23;
const VK_HOME: u16 = 0x24;
const VK_LEFT: u16 = 0x25;
const VK_UP: u16 = 0x26;
const VK_RIGHT: u16 = 0x27;
const VK_DOWN: u16 = 0x28;
const VK_INSERT: u16 = 0x2D;
const VK_DELETE: u16 = 0x2E;
const VK_F1: u16 = 0x70;
const VK_F12: u16 = 0x7B;

// dwControlKeyState bits.
const RIGHT_ALT_PRESSED: u32 = 0x0001;
const LEFT_ALT_PRESSED: u32 = 0x0002;
const RIGHT_CTRL_PRESSED: u32 = 0x0004;
const LEFT_CTRL_PRESSED: u32 = 0x0008;
const SHIFT_PRESSED: u32 = 0x0010;

// MOUSE_EVENT_RECORD dwEventFlags.
const MOUSE_MOVED: u32 = 0x0001;
const MOUSE_WHEELED: u32 = 0x0004;

// dwButtonState bits.
const FROM_LEFT_1ST_BUTTON: u32 = 0x0001;
const RIGHTMOST_BUTTON: u32 = 0x0002;
const FROM_LEFT_2ND_BUTTON: u32 = 0x0004;

/// A peeked event parked until the next `poll_event`.
#[derive(Debug)]
enum Pending {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(Size),
    Focus(bool),
    Paste(Vec<u8>),
}

/// Windows console backend. See the module docs.
#[derive(Debug)]
pub struct WindowsBackend {
    stdin: HANDLE,
    stdout: HANDLE,
    saved_input_mode: u32,
    saved_output_mode: u32,
    saved_input_cp: u32,
    saved_output_cp: u32,
    caps: Capabilities,
    options: InitOptions,
    active: ActiveModes,
    decoder: Decoder,
    /// Events translated from records but not yet handed out.
    queued: VecDeque<RawEvent>,
    /// A pending high surrogate waiting for its low half.
    surrogate: Option<u16>,
    out_buf: Vec<u8>,
    pending: Option<Pending>,
    paste_stash: Vec<u8>,
    /// Pressed-state of mouse buttons, to synthesize Release events from
    /// button-state transitions.
    buttons_down: u32,
    cleaned_up: bool,
}

// SAFETY: the raw console handles are process-global pseudo-handles; the
// backend itself is used from one thread per the crate's threading model.
unsafe impl Send for WindowsBackend {}

impl WindowsBackend {
    /// Acquire console handles, switch to UTF-8 + VT modes, emit the enter
    /// sequences.
    ///
    /// # Errors
    ///
    /// [`TermCoreError::NotATerminal`] when stdin/stdout are not console
    /// handles; [`TermCoreError::SetModeFailed`] when a mode change is
    /// denied.
    pub fn init(options: InitOptions) -> TermCoreResult<Self> {
        // SAFETY: GetStdHandle/GetConsoleMode are always safe to call; the
        // results are validated before use.
        let (stdin, stdout, saved_input_mode, saved_output_mode) = unsafe {
            let stdin = GetStdHandle(STD_INPUT_HANDLE);
            let stdout = GetStdHandle(STD_OUTPUT_HANDLE);
            if stdin == INVALID_HANDLE_VALUE
                || stdout == INVALID_HANDLE_VALUE
                || stdin.is_null()
                || stdout.is_null()
            {
                return Err(TermCoreError::NotATerminal);
            }
            let mut input_mode = 0u32;
            let mut output_mode = 0u32;
            if GetConsoleMode(stdin, &mut input_mode) == 0
                || GetConsoleMode(stdout, &mut output_mode) == 0
            {
                return Err(TermCoreError::NotATerminal);
            }
            (stdin, stdout, input_mode, output_mode)
        };

        // SAFETY: reading the current code pages has no preconditions.
        let (saved_input_cp, saved_output_cp) =
            unsafe { (GetConsoleCP(), GetConsoleOutputCP()) };

        // The modern console handles the full VT feature set.
        let caps = Capabilities {
            color_depth: global_color_depth::detect_or(crate::color::ColorDepth::TrueColor),
            mouse: true,
            bracketed_paste: true,
            focus_events: true,
        };

        let mut backend = WindowsBackend {
            stdin,
            stdout,
            saved_input_mode,
            saved_output_mode,
            saved_input_cp,
            saved_output_cp,
            caps,
            options,
            active: ActiveModes::default(),
            decoder: Decoder::new(),
            queued: VecDeque::new(),
            surrogate: None,
            out_buf: Vec::with_capacity(8 * 1024),
            pending: None,
            paste_stash: Vec::new(),
            buttons_down: 0,
            cleaned_up: false,
        };

        if let Err(e) = backend.setup() {
            let _ = backend.deinit();
            return Err(e);
        }
        tracing::debug!(caps = ?backend.caps, "Windows backend initialized");
        Ok(backend)
    }

    fn setup(&mut self) -> TermCoreResult<()> {
        let mut input_mode = self.saved_input_mode;
        input_mode &= !(ENABLE_LINE_INPUT
            | ENABLE_ECHO_INPUT
            | ENABLE_PROCESSED_INPUT
            | ENABLE_QUICK_EDIT_MODE);
        input_mode |=
            ENABLE_VIRTUAL_TERMINAL_INPUT | ENABLE_WINDOW_INPUT | ENABLE_EXTENDED_FLAGS;
        if self.options.enable_mouse {
            input_mode |= ENABLE_MOUSE_INPUT;
        }
        let output_mode = self.saved_output_mode
            | ENABLE_VIRTUAL_TERMINAL_PROCESSING
            | ENABLE_PROCESSED_OUTPUT;

        // SAFETY: handles were validated at init.
        unsafe {
            if SetConsoleMode(self.stdin, input_mode) == 0
                || SetConsoleMode(self.stdout, output_mode) == 0
            {
                return Err(TermCoreError::SetModeFailed(io::Error::last_os_error()));
            }
            if SetConsoleCP(CP_UTF8) == 0 || SetConsoleOutputCP(CP_UTF8) == 0 {
                return Err(TermCoreError::SetModeFailed(io::Error::last_os_error()));
            }
        }

        self.active = ActiveModes::plan(self.caps, self.options);
        let enter = sequences::enter_sequences(self.active);
        self.write_bytes(&enter)?;
        self.flush_output()
    }

    fn modifiers_from_state(state: u32) -> Modifiers {
        Modifiers {
            ctrl: state & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0,
            alt: state & (LEFT_ALT_PRESSED | RIGHT_ALT_PRESSED) != 0,
            shift: state & SHIFT_PRESSED != 0,
        }
    }

    fn special_from_vk(vk: u16) -> Option<KeyCode> {
        match vk {
            VK_BACK => Some(KeyCode::Backspace),
            VK_TAB => Some(KeyCode::Tab),
            VK_RETURN => Some(KeyCode::Enter),
            VK_ESCAPE => Some(KeyCode::Escape),
            VK_PRIOR => Some(KeyCode::PageUp),
            VK_NEXT => Some(KeyCode::PageDown),
            VK_END => Some(KeyCode::End),
            VK_HOME => Some(KeyCode::Home),
            VK_LEFT => Some(KeyCode::Left),
            VK_UP => Some(KeyCode::Up),
            VK_RIGHT => Some(KeyCode::Right),
            VK_DOWN => Some(KeyCode::Down),
            VK_INSERT => Some(KeyCode::Insert),
            VK_DELETE => Some(KeyCode::Delete),
            VK_F1..=VK_F12 => {
                #[allow(clippy::cast_possible_truncation)]
                let n = (vk - VK_F1 + 1) as u8;
                Some(KeyCode::Function(n))
            }
            _ => None,
        }
    }

    /// Feed one UTF-16 code unit, resolving surrogate pairs, and run the
    /// resulting codepoint's UTF-8 bytes through the shared decoder.
    fn feed_utf16_unit(&mut self, unit: u16) -> TermCoreResult<()> {
        let ch = match (self.surrogate.take(), unit) {
            (None, 0xD800..=0xDBFF) => {
                self.surrogate = Some(unit);
                return Ok(());
            }
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined = 0x10000
                    + ((u32::from(high) - 0xD800) << 10)
                    + (u32::from(unit) - 0xDC00);
                char::from_u32(combined)
            }
            (Some(_), _) => {
                // Orphan high surrogate; drop it and reprocess the unit.
                char::from_u32(u32::from(unit))
            }
            (None, _) => char::from_u32(u32::from(unit)),
        };
        let Some(ch) = ch else { return Ok(()) };

        let mut utf8 = [0u8; 4];
        for &byte in ch.encode_utf8(&mut utf8).as_bytes() {
            if let Some(raw) = self.decoder.feed_raw(byte)? {
                self.queued.push_back(raw);
            }
        }
        Ok(())
    }

    /// Translate one input record into queued events.
    fn translate_record(&mut self, record: &INPUT_RECORD) -> TermCoreResult<()> {
        match record.EventType {
            KEY_EVENT => {
                // SAFETY: EventType selects the union arm.
                let key = unsafe { record.Event.KeyEvent };
                if key.bKeyDown == 0 {
                    return Ok(());
                }
                let unit = unsafe { key.uChar.UnicodeChar };
                let repeat = key.wRepeatCount.max(1);
                for _ in 0..repeat {
                    if unit != 0 {
                        self.feed_utf16_unit(unit)?;
                    } else if let Some(code) = Self::special_from_vk(key.wVirtualKeyCode)
                    {
                        self.queued.push_back(RawEvent::Key(KeyEvent::new(
                            code,
                            Self::modifiers_from_state(key.dwControlKeyState),
                        )));
                    }
                }
            }
            MOUSE_EVENT => {
                // SAFETY: EventType selects the union arm.
                let mouse = unsafe { record.Event.MouseEvent };
                if let Some(event) = self.translate_mouse(&mouse) {
                    self.queued.push_back(RawEvent::Mouse(event));
                }
            }
            WINDOW_BUFFER_SIZE_EVENT => {
                // SAFETY: EventType selects the union arm.
                let size = unsafe { record.Event.WindowBufferSizeEvent.dwSize };
                let cols = u16::try_from(size.X.max(1)).unwrap_or(1);
                let rows = u16::try_from(size.Y.max(1)).unwrap_or(1);
                // Coalesce: only the latest size matters.
                self.queued.retain(|e| !matches!(e, RawEvent::Resize(_)));
                self.queued.push_back(RawEvent::Resize(Size::new(cols, rows)));
            }
            FOCUS_EVENT => {
                if self.options.enable_focus_events {
                    // SAFETY: EventType selects the union arm.
                    let focus = unsafe { record.Event.FocusEvent };
                    self.queued.push_back(RawEvent::Focus(focus.bSetFocus != 0));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn translate_mouse(
        &mut self,
        mouse: &windows_sys::Win32::System::Console::MOUSE_EVENT_RECORD,
    ) -> Option<MouseEvent> {
        let pos = Pos::new(
            u16::try_from(mouse.dwMousePosition.X.max(0)).unwrap_or(0),
            u16::try_from(mouse.dwMousePosition.Y.max(0)).unwrap_or(0),
        );
        let modifiers = Self::modifiers_from_state(mouse.dwControlKeyState);

        let button = if mouse.dwEventFlags & MOUSE_WHEELED != 0 {
            // High word of dwButtonState is the signed wheel delta.
            #[allow(clippy::cast_possible_wrap)]
            let delta = (mouse.dwButtonState >> 16) as i16;
            if delta > 0 {
                MouseButton::WheelUp
            } else {
                MouseButton::WheelDown
            }
        } else if mouse.dwEventFlags & MOUSE_MOVED != 0 {
            MouseButton::Move
        } else {
            let now_down = mouse.dwButtonState
                & (FROM_LEFT_1ST_BUTTON | RIGHTMOST_BUTTON | FROM_LEFT_2ND_BUTTON);
            let newly = now_down & !self.buttons_down;
            let released = self.buttons_down & !now_down;
            self.buttons_down = now_down;
            if newly & FROM_LEFT_1ST_BUTTON != 0 {
                MouseButton::Left
            } else if newly & RIGHTMOST_BUTTON != 0 {
                MouseButton::Right
            } else if newly & FROM_LEFT_2ND_BUTTON != 0 {
                MouseButton::Middle
            } else if released != 0 {
                MouseButton::Release
            } else {
                return None;
            }
        };
        Some(MouseEvent {
            pos,
            button,
            modifiers,
        })
    }

    /// Read every currently available input record and translate it.
    fn drain_console_input(&mut self) -> TermCoreResult<bool> {
        let mut any = false;
        loop {
            let mut available = 0u32;
            // SAFETY: the handle was validated at init.
            if unsafe { GetNumberOfConsoleInputEvents(self.stdin, &mut available) } == 0
            {
                return Err(TermCoreError::ReadFailed(io::Error::last_os_error()));
            }
            if available == 0 {
                return Ok(any);
            }

            let mut records: [INPUT_RECORD; 64] = unsafe { std::mem::zeroed() };
            let mut read = 0u32;
            // SAFETY: the buffer length is passed and `read` reports how many
            // records were filled.
            let ok = unsafe {
                ReadConsoleInputW(
                    self.stdin,
                    records.as_mut_ptr(),
                    records.len() as u32,
                    &mut read,
                )
            };
            if ok == 0 {
                return Err(TermCoreError::ReadFailed(io::Error::last_os_error()));
            }
            for record in records.iter().take(read as usize) {
                self.translate_record(record)?;
            }
            any = true;
        }
    }

    /// The pump core; mirrors the POSIX pump with `WaitForSingleObject`
    /// standing in for poll(2).
    fn poll_raw(&mut self, timeout_ms: u64) -> TermCoreResult<Option<RawEvent>> {
        if let Some(raw) = self.queued.pop_front() {
            return Ok(Some(raw));
        }
        self.drain_console_input()?;
        if let Some(raw) = self.queued.pop_front() {
            return Ok(Some(raw));
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let escape_wait = Duration::from_millis(self.options.escape_timeout_ms);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = if self.decoder.is_pending() {
                remaining.min(escape_wait)
            } else {
                remaining
            };
            let wait_ms = u32::try_from(wait.as_millis()).unwrap_or(u32::MAX);

            // SAFETY: the handle was validated at init.
            let status = unsafe { WaitForSingleObject(self.stdin, wait_ms) };
            if status == WAIT_OBJECT_0 {
                self.drain_console_input()?;
                if let Some(raw) = self.queued.pop_front() {
                    return Ok(Some(raw));
                }
            } else if status == WAIT_TIMEOUT {
                if self.decoder.is_pending()
                    && let Some(Event::Key(key)) = self.decoder.reset()
                {
                    return Ok(Some(RawEvent::Key(key)));
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            } else {
                return Err(TermCoreError::ReadFailed(io::Error::last_os_error()));
            }

            if Instant::now() >= deadline && !self.decoder.is_pending() {
                return Ok(None);
            }
        }
    }

    fn materialize(&self, raw: RawEvent) -> Event<'_> {
        match raw {
            RawEvent::Key(k) => Event::Key(k),
            RawEvent::Mouse(m) => Event::Mouse(m),
            RawEvent::Resize(s) => Event::Resize(s),
            RawEvent::Focus(f) => Event::Focus(f),
            RawEvent::Paste => Event::Paste(self.decoder.paste_bytes()),
        }
    }
}

impl Backend for WindowsBackend {
    fn capabilities(&self) -> Capabilities { self.caps }

    fn size(&self) -> TermCoreResult<Size> {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        // SAFETY: the handle was validated at init.
        if unsafe { GetConsoleScreenBufferInfo(self.stdout, &mut info) } == 0 {
            return Err(TermCoreError::ReadFailed(io::Error::last_os_error()));
        }
        let cols = (info.srWindow.Right - info.srWindow.Left + 1).max(1);
        let rows = (info.srWindow.Bottom - info.srWindow.Top + 1).max(1);
        Ok(Size::new(
            u16::try_from(cols).unwrap_or(1),
            u16::try_from(rows).unwrap_or(1),
        ))
    }

    fn poll_event(&mut self, timeout_ms: u64) -> TermCoreResult<Option<Event<'_>>> {
        if let Some(pending) = self.pending.take() {
            let event = match pending {
                Pending::Key(k) => Event::Key(k),
                Pending::Mouse(m) => Event::Mouse(m),
                Pending::Resize(s) => Event::Resize(s),
                Pending::Focus(f) => Event::Focus(f),
                Pending::Paste(bytes) => {
                    self.paste_stash = bytes;
                    Event::Paste(&self.paste_stash)
                }
            };
            return Ok(Some(event));
        }
        match self.poll_raw(timeout_ms)? {
            Some(raw) => Ok(Some(self.materialize(raw))),
            None => Ok(None),
        }
    }

    fn peek_event(&mut self) -> TermCoreResult<Option<Event<'_>>> {
        if self.pending.is_none()
            && let Some(raw) = self.poll_raw(0)?
        {
            self.pending = Some(match raw {
                RawEvent::Key(k) => Pending::Key(k),
                RawEvent::Mouse(m) => Pending::Mouse(m),
                RawEvent::Resize(s) => Pending::Resize(s),
                RawEvent::Focus(f) => Pending::Focus(f),
                RawEvent::Paste => Pending::Paste(self.decoder.paste_bytes().to_vec()),
            });
        }
        Ok(self.pending.as_ref().map(|pending| match pending {
            Pending::Key(k) => Event::Key(*k),
            Pending::Mouse(m) => Event::Mouse(*m),
            Pending::Resize(s) => Event::Resize(*s),
            Pending::Focus(f) => Event::Focus(*f),
            Pending::Paste(bytes) => Event::Paste(bytes),
        }))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> TermCoreResult<()> {
        self.out_buf.extend_from_slice(bytes);
        Ok(())
    }

    fn flush_output(&mut self) -> TermCoreResult<()> {
        if self.out_buf.is_empty() {
            return Ok(());
        }
        let expected = self.out_buf.len();
        let mut written = 0usize;
        while written < expected {
            let chunk = &self.out_buf[written..];
            let mut wrote = 0u32;
            // SAFETY: the handle was validated at init; the pointer/length
            // pair describes `chunk`.
            let ok = unsafe {
                WriteFile(
                    self.stdout,
                    chunk.as_ptr(),
                    u32::try_from(chunk.len()).unwrap_or(u32::MAX),
                    &mut wrote,
                    std::ptr::null_mut(),
                )
            };
            if ok == 0 {
                self.out_buf.drain(..written);
                return Err(TermCoreError::WriteFailed(io::Error::last_os_error()));
            }
            if wrote == 0 {
                self.out_buf.drain(..written);
                return Err(TermCoreError::PartialWrite { written, expected });
            }
            written += wrote as usize;
        }
        self.out_buf.clear();
        Ok(())
    }

    /// Cleanup order: reverse escape sequences, restore code pages, restore
    /// console modes. Idempotent.
    fn deinit(&mut self) -> TermCoreResult<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;
        let mut first_error: Option<TermCoreError> = None;

        let exit = sequences::exit_sequences(self.active);
        let _ = self.write_bytes(&exit);
        if let Err(e) = self.flush_output()
            && first_error.is_none()
        {
            first_error = Some(e);
        }

        // SAFETY: restoring previously read values on validated handles.
        unsafe {
            SetConsoleCP(self.saved_input_cp);
            SetConsoleOutputCP(self.saved_output_cp);
            if (SetConsoleMode(self.stdin, self.saved_input_mode) == 0
                || SetConsoleMode(self.stdout, self.saved_output_mode) == 0)
                && first_error.is_none()
            {
                first_error =
                    Some(TermCoreError::SetModeFailed(io::Error::last_os_error()));
            }
        }

        tracing::debug!("Windows backend cleaned up");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for WindowsBackend {
    fn drop(&mut self) {
        let _ = self.deinit();
    }
}
