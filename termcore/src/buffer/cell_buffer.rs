// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Row-major grid of [`Cell`]s with bounds-safe access and width-aware
//! printing.

use crate::buffer::{Cell, char_width, is_zero_width};
use crate::color::Style;
use crate::units::{Pos, Rect, Size};

/// A `height × width` grid of cells.
///
/// All access is bounds-safe: writes outside the grid are ignored, reads
/// outside the grid return [`Cell::BLANK`]. Buffers start out fully
/// transparent ([`Cell::EMPTY`]) so a fresh plane composites as "nothing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellBuffer {
    size: Size,
    cells: Vec<Cell>,
}

impl CellBuffer {
    #[must_use]
    pub fn new(size: Size) -> Self {
        CellBuffer {
            size,
            cells: vec![Cell::EMPTY; size.area()],
        }
    }

    #[must_use]
    pub fn size(&self) -> Size { self.size }

    /// Reallocate to `new_size`. Contents are reset to transparent; the owner
    /// is responsible for marking everything dirty.
    pub fn resize(&mut self, new_size: Size) {
        self.size = new_size;
        self.cells.clear();
        self.cells.resize(new_size.area(), Cell::EMPTY);
    }

    fn index(&self, col: u16, row: u16) -> Option<usize> {
        if col < self.size.cols && row < self.size.rows {
            Some(usize::from(row) * usize::from(self.size.cols) + usize::from(col))
        } else {
            None
        }
    }

    /// Read the cell at `(col, row)`; out-of-range reads return
    /// [`Cell::BLANK`].
    #[must_use]
    pub fn get_cell(&self, col: u16, row: u16) -> &Cell {
        static BLANK: Cell = Cell::BLANK;
        match self.index(col, row) {
            Some(i) => &self.cells[i],
            None => &BLANK,
        }
    }

    /// Write the cell at `(col, row)`; out-of-range writes are ignored.
    pub fn set_cell(&mut self, col: u16, row: u16, cell: Cell) {
        if let Some(i) = self.index(col, row) {
            self.cells[i] = cell;
        }
    }

    /// Mutable access for in-place edits (combining-mark attachment).
    pub(crate) fn get_cell_mut(&mut self, col: u16, row: u16) -> Option<&mut Cell> {
        self.index(col, row).map(move |i| &mut self.cells[i])
    }

    /// Fill `rect` (clipped to the buffer) with clones of `cell`.
    pub fn fill(&mut self, rect: Rect, cell: &Cell) {
        let clipped = rect.intersect(Rect::from(self.size));
        if clipped.is_empty() {
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x0, y0) = (clipped.x as u16, clipped.y as u16);
        for row in y0..y0 + clipped.height {
            for col in x0..x0 + clipped.width {
                self.set_cell(col, row, cell.clone());
            }
        }
    }

    /// Reset every cell to transparent.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::EMPTY);
    }

    /// Print `text` starting at `pos`, decoding one codepoint at a time.
    ///
    /// - Zero-width marks attach to the most recently printed base cell (for a
    ///   wide base: the base column, never the continuation), up to the
    ///   per-cell cap; extras are dropped.
    /// - A wide character that would straddle the right edge is replaced with
    ///   a single space.
    /// - Output is clipped at the right edge; there is no wrapping.
    ///
    /// Returns the number of columns advanced.
    pub fn print(&mut self, pos: Pos, text: &str, style: Style) -> u16 {
        let mut col = pos.col;
        let mut last_base: Option<u16> = None;

        for ch in text.chars() {
            if is_zero_width(ch) {
                if let Some(base_col) = last_base
                    && let Some(cell) = self.get_cell_mut(base_col, pos.row)
                {
                    cell.push_combining(ch);
                }
                continue;
            }
            let width = char_width(ch);
            if width == 0 {
                // Control characters never become cells.
                continue;
            }
            if col >= self.size.cols {
                break;
            }
            if width == 2 {
                if col + 1 >= self.size.cols {
                    // Wide base at the last column cannot fit.
                    self.set_cell(col, pos.row, Cell::new(' ', style));
                    last_base = None;
                    col += 1;
                    continue;
                }
                let base = Cell::new(ch, style);
                let cont = Cell::continuation_of(&base);
                self.set_cell(col, pos.row, base);
                self.set_cell(col + 1, pos.row, cont);
                last_base = Some(col);
                col += 2;
            } else {
                self.set_cell(col, pos.row, Cell::new(ch, style));
                last_base = Some(col);
                col += 1;
            }
        }
        col - pos.col
    }

    /// Copy one whole row from `other`. Both buffers must be the same size;
    /// mismatches are ignored.
    pub(crate) fn copy_row_from(&mut self, other: &CellBuffer, row: u16) {
        if self.size != other.size || row >= self.size.rows {
            return;
        }
        let start = usize::from(row) * usize::from(self.size.cols);
        let end = start + usize::from(self.size.cols);
        self.cells[start..end].clone_from_slice(&other.cells[start..end]);
    }

    /// Visit every cell in `rect` (clipped), row-major.
    pub(crate) fn for_each_in_rect(
        &self,
        rect: Rect,
        mut visit: impl FnMut(u16, u16, &Cell),
    ) {
        let clipped = rect.intersect(Rect::from(self.size));
        if clipped.is_empty() {
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x0, y0) = (clipped.x as u16, clipped.y as u16);
        for row in y0..y0 + clipped.height {
            for col in x0..x0 + clipped.width {
                visit(col, row, self.get_cell(col, row));
            }
        }
    }

    /// Concatenated base codepoints of a row, continuations skipped, trailing
    /// empties trimmed. Test and debug helper.
    #[must_use]
    pub fn row_text(&self, row: u16) -> String {
        let mut out = String::new();
        for col in 0..self.size.cols {
            let cell = self.get_cell(col, row);
            if cell.is_continuation() {
                continue;
            }
            out.push(cell.ch);
            for &mark in &cell.combining {
                out.push(mark);
            }
        }
        out.trim_end().to_string()
    }
}
