// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Terminal input decoding: raw bytes in, canonicalized events out.
//!
//! The [`Decoder`] is a byte-serial state machine covering ASCII controls,
//! UTF-8 (with Alt variants), CSI and SS3 keyboard sequences, the Kitty
//! `CSI u` protocol, SGR and legacy X10 mouse reports, focus notifications,
//! and bracketed paste. See [`decoder`] for the state diagram.

// Attach sources.
pub mod decoder;
mod keyboard;
mod mouse;
mod params;
mod paste;
pub mod types;
mod utf8;

// Re-export.
pub use decoder::*;
pub use paste::PASTE_CAP;
pub use types::*;
