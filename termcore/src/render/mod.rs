// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Diff rendering: compare the application-drawable back buffer against the
//! front buffer (last known terminal state) and emit the minimal escape
//! sequence delta.

// Attach sources.
pub mod renderer;
pub mod sgr;

// Re-export.
pub use renderer::*;
pub use sgr::*;
