// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The cell grid: [`Cell`], [`CellBuffer`], and display-width handling.
//!
//! Everything that ends up on screen passes through a [`CellBuffer`]: plane
//! contents, the compositor's target, and the renderer's front/back pair are
//! all the same type. Access is bounds-safe by contract: out-of-range writes
//! are ignored and out-of-range reads return [`Cell::BLANK`].

// Attach sources.
pub mod cell;
pub mod cell_buffer;
pub mod width;

// Re-export.
pub use cell::*;
pub use cell_buffer::*;
pub use width::*;
