// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Z-ordered, transparent overlay planes composed onto a target buffer.
//!
//! Planes form a tree rooted at one full-screen plane. The tree is an arena:
//! [`PlaneId`]s are stable, generation-checked indices, parent/child links are
//! IDs rather than owning handles, and the children list is the sole
//! ownership edge. Content mutations and geometry changes accumulate dirty
//! rectangles; [`compose`](PlaneTree::compose) rebuilds exactly those regions
//! of the target.

// Attach sources.
pub mod compositor;
pub mod tree;

// Re-export.
pub use tree::*;
