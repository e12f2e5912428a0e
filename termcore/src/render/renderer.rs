// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Double-buffered diff renderer.
//!
//! The renderer owns two [`CellBuffer`]s: the *back* buffer the application
//! (or the compositor) draws into, and the *front* buffer mirroring what the
//! terminal currently shows. [`flush`](Renderer::flush) walks the grid
//! row-major and, for each cell where the two differ, emits a cursor move
//! (elided when the cursor is already there), an SGR delta (elided against the
//! last emitted colors/attributes), and the cell's UTF-8 bytes.
//!
//! Output is written row by row. A failed row write leaves that row's front
//! cells untouched, so the next flush retries the same diff; the terminal
//! never silently drifts from the front buffer.
//!
//! Colors are downgraded to the detected [`ColorDepth`] at emission time;
//! comparison happens on the downgraded values so a 24-bit back buffer on a
//! 256-color terminal still diffs minimally.

use std::io::Write;

use crate::buffer::{Cell, CellBuffer, is_wide};
use crate::color::{Attributes, Color, ColorDepth, downgrade};
use crate::error::{TermCoreError, TermCoreResult};
use crate::render::sgr;
use crate::units::{Pos, Size};

/// Last emitted SGR values, for redundant-sequence elision.
#[derive(Debug, Clone, Copy)]
struct SgrState {
    fg: Color,
    bg: Color,
    attrs: Attributes,
    /// False right after init/resize/write-error: the terminal's actual state
    /// is unknown and the next emission starts from a reset.
    known: bool,
}

impl SgrState {
    const UNKNOWN: SgrState = SgrState {
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attributes::NONE,
        known: false,
    };

    fn reset() -> SgrState {
        SgrState {
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attributes::NONE,
            known: true,
        }
    }
}

/// Diff renderer with front/back buffers.
#[derive(Debug)]
pub struct Renderer {
    front: CellBuffer,
    back: CellBuffer,
    depth: ColorDepth,
    sgr: SgrState,
    /// Logical cursor position; `None` when unknown (init, resize, wrap).
    cursor: Option<Pos>,
    full_redraw: bool,
    scratch: Vec<u8>,
}

impl Renderer {
    #[must_use]
    pub fn new(size: Size, depth: ColorDepth) -> Self {
        Renderer {
            front: CellBuffer::new(size),
            back: CellBuffer::new(size),
            depth,
            sgr: SgrState::UNKNOWN,
            cursor: None,
            full_redraw: true,
            scratch: Vec::with_capacity(4 * 1024),
        }
    }

    #[must_use]
    pub fn size(&self) -> Size { self.back.size() }

    #[must_use]
    pub fn color_depth(&self) -> ColorDepth { self.depth }

    /// The application-drawable buffer (also the compositor's target).
    ///
    /// After [`resize`](Self::resize) any previously obtained reference is
    /// gone; re-acquire it.
    pub fn back_mut(&mut self) -> &mut CellBuffer { &mut self.back }

    #[must_use]
    pub fn back(&self) -> &CellBuffer { &self.back }

    /// The terminal cursor was moved behind the renderer's back (e.g. the
    /// facade parked a visible application cursor); stop eliding moves until
    /// the position is re-established.
    pub fn invalidate_cursor(&mut self) { self.cursor = None; }

    /// Reallocate both buffers and invalidate all cells: the next flush is a
    /// full redraw.
    pub fn resize(&mut self, new_size: Size) {
        self.front.resize(new_size);
        self.back.resize(new_size);
        self.sgr = SgrState::UNKNOWN;
        self.cursor = None;
        self.full_redraw = true;
    }

    /// Diff back against front and write the delta to `writer`.
    ///
    /// # Errors
    ///
    /// [`TermCoreError::WriteFailed`] when a row write fails; the failed row's
    /// front cells are left stale so the next flush retries it.
    pub fn flush<W: Write>(&mut self, writer: &mut W) -> TermCoreResult<()> {
        let size = self.back.size();
        let mut rows_emitted = 0usize;

        for row in 0..size.rows {
            let row_dirty = self.emit_row(row, size.cols);
            if !row_dirty {
                continue;
            }
            if let Err(e) = writer.write_all(&self.scratch) {
                // Terminal state is now uncertain; force safe re-emission.
                self.sgr = SgrState::UNKNOWN;
                self.cursor = None;
                return Err(TermCoreError::WriteFailed(e));
            }
            self.front.copy_row_from(&self.back, row);
            rows_emitted += 1;
        }

        if rows_emitted > 0 {
            tracing::trace!(rows = rows_emitted, "flushed dirty rows");
        }
        self.full_redraw = false;
        Ok(())
    }

    /// Emit the escape delta for one row into `self.scratch`. Returns whether
    /// anything was emitted. Front cells are NOT updated here; the caller
    /// does that only after the row bytes are safely written.
    fn emit_row(&mut self, row: u16, cols: u16) -> bool {
        self.scratch.clear();
        let mut dirty = false;
        let mut col = 0u16;

        while col < cols {
            let back_cell = self.back.get_cell(col, row);
            if back_cell.is_continuation() {
                // The wide base at col-1 owns this column; a stray
                // continuation with no base renders as nothing.
                col += 1;
                continue;
            }
            let wide = is_wide(back_cell.ch);
            let width = if wide { 2 } else { 1 };

            if !self.cell_differs(col, row, wide) {
                col += width;
                continue;
            }

            dirty = true;
            // scratch/sgr/cursor need simultaneous mutable access with the
            // cell borrow; clone the small cell instead of fighting it.
            let cell = back_cell.clone();
            self.emit_cell(col, row, &cell, width, cols);
            col += width;
        }
        dirty
    }

    fn cell_differs(&self, col: u16, row: u16, wide: bool) -> bool {
        if self.full_redraw {
            return true;
        }
        let back_cell = self.back.get_cell(col, row);
        let front_cell = self.front.get_cell(col, row);
        if !back_cell.diff_eq(front_cell) {
            return true;
        }
        // A wide pair is only intact when the front also holds the
        // continuation; anything else there means the pair must be redrawn so
        // no orphan base or continuation survives.
        wide && !self.front.get_cell(col + 1, row).is_continuation()
    }

    fn emit_cell(&mut self, col: u16, row: u16, cell: &Cell, width: u16, cols: u16) {
        if self.cursor != Some(Pos::new(col, row)) {
            sgr::cursor_move(&mut self.scratch, col, row);
        }

        let fg = downgrade(cell.fg, self.depth);
        let bg = downgrade(cell.bg, self.depth);
        self.apply_sgr(fg, bg, cell.attrs);

        let mut utf8 = [0u8; 4];
        if cell.ch == '\0' {
            // Empty (composited-transparent) cells render as a plain space.
            self.scratch.push(b' ');
        } else {
            self.scratch
                .extend_from_slice(cell.ch.encode_utf8(&mut utf8).as_bytes());
            for &mark in &cell.combining {
                self.scratch
                    .extend_from_slice(mark.encode_utf8(&mut utf8).as_bytes());
            }
        }

        // Logical cursor advance; at the right edge wrap behavior is
        // terminal-specific, so the position becomes unknown.
        self.cursor = if col + width >= cols {
            None
        } else {
            Some(Pos::new(col + width, row))
        };
    }

    /// Emit the SGR delta from the last emitted state to `(fg, bg, attrs)`.
    ///
    /// Turning any attribute *off* requires a full `SGR 0` reset followed by
    /// re-emission of the surviving set.
    fn apply_sgr(&mut self, fg: Color, bg: Color, attrs: Attributes) {
        let needs_reset =
            !self.sgr.known || !self.sgr.attrs.difference(attrs).is_empty();
        if needs_reset {
            sgr::sgr_reset(&mut self.scratch);
            self.sgr = SgrState::reset();
        }

        let added = attrs.difference(self.sgr.attrs);
        if !added.is_empty() {
            sgr::sgr_attributes(&mut self.scratch, added);
        }
        if fg != self.sgr.fg {
            sgr::sgr_foreground(&mut self.scratch, fg);
        }
        if bg != self.sgr.bg {
            sgr::sgr_background(&mut self.scratch, bg);
        }
        self.sgr = SgrState {
            fg,
            bg,
            attrs,
            known: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Style;
    use crate::units::Pos;
    use pretty_assertions::assert_eq;

    fn renderer(cols: u16, rows: u16) -> Renderer {
        Renderer::new(Size::new(cols, rows), ColorDepth::TrueColor)
    }

    fn flush_to_vec(r: &mut Renderer) -> Vec<u8> {
        let mut out = Vec::new();
        r.flush(&mut out).expect("Vec writes are infallible");
        out
    }

    #[test]
    fn first_flush_is_full_redraw() {
        let mut r = renderer(4, 2);
        r.back_mut().print(Pos::new(0, 0), "hi", Style::default());
        let out = flush_to_vec(&mut r);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("hi"), "{text:?}");
        // Empty cells render as spaces on the initial paint.
        assert!(text.contains("\x1b[1;1H"), "{text:?}");
    }

    #[test]
    fn unchanged_state_emits_nothing() {
        let mut r = renderer(10, 3);
        r.back_mut().print(Pos::new(0, 0), "hello", Style::default());
        let _ = flush_to_vec(&mut r);
        let second = flush_to_vec(&mut r);
        assert_eq!(second, b"");
    }

    #[test]
    fn diff_is_minimal_after_single_cell_change() {
        // Fill 20×10 with 'X', flush, change one cell, flush again.
        let mut r = renderer(20, 10);
        for row in 0..10 {
            r.back_mut()
                .print(Pos::new(0, row), &"X".repeat(20), Style::default());
        }
        let first = flush_to_vec(&mut r);
        r.back_mut()
            .set_cell(5, 5, Cell::new('O', Style::default()));
        let second = flush_to_vec(&mut r);
        assert!(
            second.len() < first.len() / 2,
            "second flush ({}) should be far smaller than the first ({})",
            second.len(),
            first.len()
        );
        assert!(second.contains(&b'O'));
        assert!(!second.contains(&b'X'));
    }

    #[test]
    fn cursor_moves_are_elided_for_adjacent_cells() {
        let mut r = renderer(10, 1);
        r.back_mut().print(Pos::new(0, 0), "abc", Style::default());
        let _ = flush_to_vec(&mut r);
        // Change three adjacent cells; exactly one cursor move expected.
        r.back_mut().print(Pos::new(0, 0), "xyz", Style::default());
        let out = flush_to_vec(&mut r);
        let moves = out.windows(2).filter(|w| w == b"\x1b[").count();
        // One cursor move; SGR state is unchanged so no SGR sequences at all.
        assert_eq!(moves, 1, "{:?}", String::from_utf8_lossy(&out));
    }

    #[test]
    fn sgr_is_elided_when_style_repeats() {
        let mut r = renderer(10, 1);
        let style = Style {
            fg: Color::RED,
            ..Style::default()
        };
        r.back_mut().print(Pos::new(0, 0), "aaaa", style);
        let out = flush_to_vec(&mut r);
        let fg_count = out
            .windows(b"\x1b[31m".len())
            .filter(|w| w == b"\x1b[31m")
            .count();
        assert_eq!(fg_count, 1, "{:?}", String::from_utf8_lossy(&out));
    }

    #[test]
    fn attribute_removal_resets_and_reemits_survivors() {
        let mut r = renderer(4, 1);
        let bold_under = Style {
            attrs: Attributes::BOLD | Attributes::UNDERLINE,
            ..Style::default()
        };
        r.back_mut().print(Pos::new(0, 0), "a", bold_under);
        let _ = flush_to_vec(&mut r);

        // Drop bold, keep underline: requires reset + underline re-emission.
        let under = Style {
            attrs: Attributes::UNDERLINE,
            ..Style::default()
        };
        r.back_mut().set_cell(0, 0, Cell::new('b', under));
        let out = flush_to_vec(&mut r);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("\x1b[0m"), "{text:?}");
        assert!(text.contains("\x1b[4m"), "{text:?}");
        assert!(!text.contains("\x1b[1m"), "{text:?}");
    }

    #[test]
    fn colors_downgrade_at_emission() {
        let mut r = Renderer::new(Size::new(4, 1), ColorDepth::Color256);
        let style = Style {
            fg: Color::Rgb(255, 0, 0),
            ..Style::default()
        };
        r.back_mut().print(Pos::new(0, 0), "x", style);
        let out = flush_to_vec(&mut r);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("\x1b[38;5;196m"), "{text:?}");
        assert!(!text.contains("38;2;"), "{text:?}");
    }

    #[test]
    fn wide_cell_emits_base_and_skips_continuation() {
        let mut r = renderer(6, 1);
        r.back_mut().print(Pos::new(0, 0), "中b", Style::default());
        let out = flush_to_vec(&mut r);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains('中'), "{text:?}");
        assert!(text.contains('b'), "{text:?}");
        // Flushing again is a no-op: the continuation column stays in sync.
        assert_eq!(flush_to_vec(&mut r), b"");
    }

    #[test]
    fn narrow_over_wide_redraws_cleanly() {
        let mut r = renderer(6, 1);
        r.back_mut().print(Pos::new(0, 0), "中", Style::default());
        let _ = flush_to_vec(&mut r);
        // Overwrite both halves with narrow chars.
        r.back_mut().print(Pos::new(0, 0), "ab", Style::default());
        let out = flush_to_vec(&mut r);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("ab"), "{text:?}");
        assert_eq!(flush_to_vec(&mut r), b"");
    }

    #[test]
    fn resize_forces_full_redraw() {
        let mut r = renderer(4, 1);
        r.back_mut().print(Pos::new(0, 0), "ab", Style::default());
        let _ = flush_to_vec(&mut r);
        r.resize(Size::new(6, 2));
        r.back_mut().print(Pos::new(0, 0), "ab", Style::default());
        let out = flush_to_vec(&mut r);
        assert!(!out.is_empty());
    }

    #[test]
    fn combining_marks_are_emitted_with_base() {
        let mut r = renderer(4, 1);
        r.back_mut()
            .print(Pos::new(0, 0), "e\u{0301}", Style::default());
        let out = flush_to_vec(&mut r);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("e\u{0301}"), "{text:?}");
    }
}
