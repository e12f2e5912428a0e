// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The top-level [`Terminal`] facade: lifecycle, resize wiring, and the
//! compose → diff → flush pipeline.
//!
//! ```text
//! poll_event ──► Events ──► application draws into planes
//!                                   │
//!                                   ▼
//!              PlaneTree ── compose ──► Renderer back buffer
//!                                            │ diff vs front
//!                                            ▼
//!                                     escape bytes ──► backend ──► TTY
//! ```
//!
//! A `Resize` event is applied to the plane tree and renderer *before* it is
//! handed to the application, so any buffer reference the application held is
//! stale by the time it sees the event; re-acquire via
//! [`planes_mut`](Terminal::planes_mut).

use std::io;

use crate::backend::{Backend, Capabilities, InitOptions, PlatformBackend, sequences};
use crate::error::TermCoreResult;
use crate::input::Event;
use crate::plane::{PlaneId, PlaneTree};
use crate::render::{Renderer, sgr};
use crate::units::{Pos, Size};

/// An initialized terminal: backend + plane tree + diff renderer.
///
/// Dropping the terminal (or calling
/// [`force_cleanup`](Terminal::force_cleanup)) restores the terminal mode;
/// cleanup is idempotent and best-effort, so the terminal is never left raw
/// after process exit.
#[derive(Debug)]
pub struct Terminal {
    backend: PlatformBackend,
    renderer: Renderer,
    planes: PlaneTree,
    /// Where the visible application cursor is parked after each flush;
    /// `None` keeps it hidden (the init default).
    cursor: Option<Pos>,
}

impl Terminal {
    /// Acquire the terminal and set everything up.
    ///
    /// # Errors
    ///
    /// Fatal acquisition errors: [`crate::TermCoreError::NotATerminal`],
    /// [`crate::TermCoreError::SetModeFailed`], pipe/registry failures.
    pub fn init(options: InitOptions) -> TermCoreResult<Self> {
        let backend = PlatformBackend::init(options)?;
        let size = backend.size()?;
        let depth = backend.capabilities().color_depth;
        Ok(Terminal {
            renderer: Renderer::new(size, depth),
            planes: PlaneTree::new(size),
            backend,
            cursor: None,
        })
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities { self.backend.capabilities() }

    #[must_use]
    pub fn size(&self) -> Size { self.renderer.size() }

    /// The plane tree; draw into planes via
    /// [`buffer_mut`](PlaneTree::buffer_mut).
    pub fn planes_mut(&mut self) -> &mut PlaneTree { &mut self.planes }

    #[must_use]
    pub fn planes(&self) -> &PlaneTree { &self.planes }

    /// The root plane (fills the terminal).
    #[must_use]
    pub fn root(&self) -> PlaneId { self.planes.root() }

    /// Wait up to `timeout_ms` for the next event; `0` polls. Resize events
    /// are applied to the plane tree and renderer before being returned.
    ///
    /// # Errors
    ///
    /// See [`Backend::poll_event`].
    pub fn poll_event(&mut self, timeout_ms: u64) -> TermCoreResult<Option<Event<'_>>> {
        match self.backend.poll_event(timeout_ms)? {
            Some(Event::Resize(size)) => {
                // Only planes/renderer are touched here: the borrow conveyed
                // by the polled event covers the backend field alone.
                tracing::debug!(?size, "terminal resized");
                self.planes.set_target_size(size);
                self.renderer.resize(size);
                Ok(Some(Event::Resize(size)))
            }
            other => Ok(other),
        }
    }

    /// Non-blocking, non-consuming look at the next event.
    ///
    /// # Errors
    ///
    /// See [`Backend::peek_event`].
    pub fn peek_event(&mut self) -> TermCoreResult<Option<Event<'_>>> {
        self.backend.peek_event()
    }

    /// Compose dirty plane regions into the back buffer, diff against the
    /// front buffer, and write the delta to the terminal.
    ///
    /// # Errors
    ///
    /// Write failures; un-flushed bytes stay queued in the backend and go out
    /// on the next attempt.
    pub fn compose_and_flush(&mut self) -> TermCoreResult<()> {
        let _regions = self.planes.compose(self.renderer.back_mut());
        let mut writer = BackendWriter {
            backend: &mut self.backend,
        };
        self.renderer.flush(&mut writer)?;
        if let Some(pos) = self.cursor {
            // Park the visible application cursor; the renderer's tracked
            // position is stale from here on.
            let mut park = Vec::with_capacity(16);
            sgr::cursor_move(&mut park, pos.col, pos.row);
            self.backend.write_bytes(&park)?;
            self.renderer.invalidate_cursor();
        }
        self.backend.flush_output()
    }

    /// Show the terminal cursor at `pos` after every flush, or hide it again
    /// with `None` (the init default). Useful for text-entry UIs.
    ///
    /// # Errors
    ///
    /// Write failures while toggling cursor visibility.
    pub fn set_cursor(&mut self, pos: Option<Pos>) -> TermCoreResult<()> {
        if self.cursor.is_some() != pos.is_some() {
            self.backend.write_bytes(if pos.is_some() {
                sequences::SHOW_CURSOR
            } else {
                sequences::HIDE_CURSOR
            })?;
            self.backend.flush_output()?;
        }
        self.cursor = pos;
        Ok(())
    }

    /// Restore the terminal immediately. Idempotent; also runs on drop.
    ///
    /// # Errors
    ///
    /// The first cleanup failure, after attempting every step.
    pub fn force_cleanup(&mut self) -> TermCoreResult<()> { self.backend.deinit() }
}

/// Adapter: the renderer writes rows, the backend buffers them. Actual I/O
/// (and its error handling) happens in `flush_output`.
struct BackendWriter<'a> {
    backend: &'a mut PlatformBackend,
}

impl io::Write for BackendWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.backend
            .write_bytes(buf)
            .map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}
