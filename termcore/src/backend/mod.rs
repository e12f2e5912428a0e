// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Platform backends: raw-mode acquisition, capability detection, resize
//! notification, and the event pump.
//!
//! Both platforms expose the same capability set (`init`, `deinit`,
//! `poll_event`, `peek_event`, `size`, `write_bytes`, `flush_output`) as the
//! [`Backend`] trait, with the concrete implementation selected at compile
//! time via [`PlatformBackend`].
//!
//! ```text
//! POSIX                                  Windows
//! ─────                                  ───────
//! /dev/tty (or stdin)                    Console in/out handles
//! rustix termios raw mode                SetConsoleMode + UTF-8 code page
//! mio poll: tty fd + SIGWINCH self-pipe  WaitForSingleObject on stdin
//! bytes → Decoder → Events               INPUT_RECORDs → Events (+ Decoder
//!                                        for VT sequences)
//! ```

// Attach sources.
pub mod capabilities;
#[cfg(unix)]
pub mod posix;
pub(crate) mod sequences;
#[cfg(unix)]
pub mod sigwinch;
#[cfg(windows)]
pub mod windows;

// Re-export.
pub use capabilities::*;
#[cfg(unix)]
pub use posix::*;
#[cfg(windows)]
pub use windows::*;

use crate::error::TermCoreResult;
use crate::input::Event;
use crate::units::Size;

/// The concrete backend for the current platform.
#[cfg(unix)]
pub type PlatformBackend = posix::PosixBackend;
/// The concrete backend for the current platform.
#[cfg(windows)]
pub type PlatformBackend = windows::WindowsBackend;

/// Configuration for backend init.
#[derive(Debug, Clone, Copy)]
pub struct InitOptions {
    /// Install the process-global SIGWINCH handler (POSIX only). When off,
    /// the application is responsible for resize detection.
    pub install_sigwinch: bool,
    /// Emit the SGR mouse enable sequences when the terminal supports them.
    pub enable_mouse: bool,
    /// Emit the bracketed paste enable sequence when supported.
    pub enable_bracketed_paste: bool,
    /// Emit the focus event enable sequence when supported.
    pub enable_focus_events: bool,
    /// How long to wait for follow-up bytes after a bare ESC before deciding
    /// it was the Escape key.
    pub escape_timeout_ms: u64,
}

impl Default for InitOptions {
    fn default() -> Self {
        InitOptions {
            install_sigwinch: true,
            enable_mouse: true,
            enable_bracketed_paste: true,
            enable_focus_events: true,
            escape_timeout_ms: 35,
        }
    }
}

/// The per-platform backend interface.
///
/// A backend owns the terminal handles, the raw-mode snapshot, and the input
/// decoder. Exactly one backend should be live per terminal.
pub trait Backend {
    /// Detected terminal capabilities (fixed at init).
    fn capabilities(&self) -> Capabilities;

    /// Current terminal size.
    ///
    /// # Errors
    ///
    /// [`crate::TermCoreError::ReadFailed`] when the size query fails.
    fn size(&self) -> TermCoreResult<Size>;

    /// Wait up to `timeout_ms` for the next event. `0` polls without
    /// blocking. Pending resizes are delivered before queued input; multiple
    /// pending resize notifications coalesce into one event carrying the
    /// current size.
    ///
    /// A returned [`Event::Paste`] borrows backend-internal storage and is
    /// valid only until the next `poll_event`/`peek_event` call.
    ///
    /// # Errors
    ///
    /// Read failures and paste overflow surface here; the event stream
    /// continues afterwards.
    fn poll_event(&mut self, timeout_ms: u64) -> TermCoreResult<Option<Event<'_>>>;

    /// Non-blocking, non-consuming look at the next event, if any.
    ///
    /// # Errors
    ///
    /// Same as [`poll_event`](Self::poll_event).
    fn peek_event(&mut self) -> TermCoreResult<Option<Event<'_>>>;

    /// Queue bytes into the output buffer.
    ///
    /// # Errors
    ///
    /// Currently infallible on both platforms; the signature matches
    /// [`flush_output`](Self::flush_output) for symmetry.
    fn write_bytes(&mut self, bytes: &[u8]) -> TermCoreResult<()>;

    /// Write the output buffer to the terminal.
    ///
    /// # Errors
    ///
    /// [`crate::TermCoreError::WriteFailed`] /
    /// [`crate::TermCoreError::PartialWrite`] on short or failed writes.
    fn flush_output(&mut self) -> TermCoreResult<()>;

    /// Restore the terminal: reverse every escape sequence emitted at init,
    /// restore the saved mode, release the resize registration. Idempotent.
    ///
    /// # Errors
    ///
    /// Best-effort; the first failure is reported but cleanup continues.
    fn deinit(&mut self) -> TermCoreResult<()>;
}
