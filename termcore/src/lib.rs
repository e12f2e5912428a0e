// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! # `r3bl_termcore`
//!
//! Low-level terminal cell I/O for full-screen applications: the substrate
//! TUIs are built on, not a framework. Four tightly coupled subsystems:
//!
//! 1. **Input decoder** ([`input`]): a byte-at-a-time state machine parsing
//!    raw terminal bytes (ASCII, UTF-8, CSI, SS3, SGR mouse, bracketed paste,
//!    Kitty keyboard) into canonicalized [`Event`]s.
//! 2. **Cell buffer + diff renderer** ([`buffer`], [`render`]): a
//!    double-buffered grid with wide-character and combining-mark semantics,
//!    emitting minimal escape-sequence deltas.
//! 3. **Plane compositor** ([`plane`]): a tree of z-ordered transparent
//!    layers composed into a target buffer with dirty-region tracking.
//! 4. **Backend** ([`backend`]): raw-mode acquisition, capability
//!    detection, signal-safe resize notification, and the event pump, for
//!    POSIX and the Windows console.
//!
//! ```text
//! raw bytes ── Decoder ──► Events ──► Application
//!                                        │
//!                                        ▼
//!                                     Planes ── Compositor ──► Target Buffer
//!                                                                   │
//!                                                                   ▼
//!                                                Renderer ──► escape bytes ──► TTY
//! ```
//!
//! The [`Terminal`] facade wires the pieces together:
//!
//! ```no_run
//! use r3bl_termcore::{Event, InitOptions, KeyCode, Pos, Style, Terminal};
//!
//! fn main() -> miette::Result<()> {
//!     let mut terminal = Terminal::init(InitOptions::default())?;
//!     let root = terminal.root();
//!     loop {
//!         if let Some(event) = terminal.poll_event(100)? {
//!             match event {
//!                 Event::Key(key) if key.code == KeyCode::Char('q') => break,
//!                 _ => {}
//!             }
//!         }
//!         if let Some(buffer) = terminal.planes_mut().buffer_mut(root) {
//!             buffer.print(Pos::new(0, 0), "hello", Style::default());
//!         }
//!         terminal.compose_and_flush()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Threading model
//!
//! Single-threaded and cooperative: all buffer mutation, decoding, and
//! rendering happen on one thread, and the only blocking point is
//! `poll_event`. The lone concurrent actor is the SIGWINCH handler, which is
//! restricted to atomic loads plus one `write(2)` per registered self-pipe.

#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

// Attach sources.
pub mod backend;
pub mod buffer;
pub mod color;
pub mod error;
pub mod input;
pub mod plane;
pub mod render;
pub mod terminal;
pub mod units;

// Re-export the public surface at the crate root.
pub use backend::{Backend, Capabilities, InitOptions, PlatformBackend,
                  detect_capabilities, global_color_depth};
pub use buffer::{COMBINING_CAP, Cell, CellBuffer, char_width, is_wide};
pub use color::{Attributes, Color, ColorDepth, Style, downgrade};
pub use error::{TermCoreError, TermCoreResult};
pub use input::{Decoder, Event, KeyCode, KeyEvent, Modifiers, MouseButton,
                MouseEvent, PASTE_CAP};
pub use plane::{PlaneId, PlaneTree};
pub use render::Renderer;
pub use terminal::Terminal;
pub use units::{Pos, Rect, Size};
