// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Compose cycle: walk the plane tree depth-first in z-order and rebuild the
//! dirty regions of the target buffer.
//!
//! For each dirty rectangle the target is first reset to transparent, then
//! every visible plane's intersection is written bottom-up, skipping
//! transparent source cells. Clipping is against the target buffer only;
//! ancestor planes do not clip their descendants.
//!
//! Wide-character integrity is enforced at the write level: a wide base and
//! its continuation are written atomically, a wide base that would straddle
//! the target's right edge degrades to a space, and an opaque write landing
//! on half of an existing wide pair blanks the other half so no orphan
//! survives.

use crate::buffer::{Cell, CellBuffer, is_wide};
use crate::units::{Rect, Size};

use super::tree::{PlaneId, PlaneTree};

impl PlaneTree {
    /// Compose all accumulated dirty regions into `target`.
    ///
    /// Returns the coalesced rectangles that were rebuilt (for renderer
    /// scissoring) and clears the internal dirty state. The first compose
    /// after creation, and every compose after a target resize, covers the
    /// full target. Cells outside the returned regions are untouched.
    pub fn compose(&mut self, target: &mut CellBuffer) -> Vec<Rect> {
        if target.size() != self.target_size {
            target.resize(self.target_size);
            self.dirty.push(Rect::from(self.target_size));
        }
        if !self.composed_once {
            self.dirty.push(Rect::from(self.target_size));
            self.composed_once = true;
        }
        if self.dirty.is_empty() {
            return Vec::new();
        }

        let target_rect = Rect::from(self.target_size);
        let regions: Vec<Rect> = self
            .dirty
            .take()
            .into_iter()
            .map(|r| expand_for_wide_pairs(target, r.intersect(target_rect)))
            .filter(|r| !r.is_empty())
            .collect();

        for region in &regions {
            target.fill(*region, &Cell::EMPTY);
            self.compose_plane(self.root, 0, 0, *region, target);
        }
        regions
    }

    /// Recursive pre-order walk: draw this plane, then its children
    /// bottom-up.
    fn compose_plane(
        &self,
        id: PlaneId,
        parent_x: i32,
        parent_y: i32,
        region: Rect,
        target: &mut CellBuffer,
    ) {
        let Some(record) = self.record(id) else {
            return;
        };
        if !record.visible {
            return;
        }
        let abs_x = parent_x + record.x;
        let abs_y = parent_y + record.y;
        let size = record.buffer.size();
        let plane_rect = Rect::new(abs_x, abs_y, size.cols, size.rows);
        let clip = plane_rect.intersect(region);

        if !clip.is_empty() {
            record.buffer.for_each_in_rect(
                Rect::new(
                    clip.x - abs_x,
                    clip.y - abs_y,
                    clip.width,
                    clip.height,
                ),
                |local_col, local_row, cell| {
                    let x = abs_x + i32::from(local_col);
                    let y = abs_y + i32::from(local_row);
                    write_composed(target, x, y, cell);
                },
            );
        }

        for &child in &record.children {
            self.compose_plane(child, abs_x, abs_y, region, target);
        }
    }
}

/// Grow a region sideways until no wide pair in the current target straddles
/// its vertical edges. Rebuilding half a pair would leave the other half
/// orphaned outside the region.
fn expand_for_wide_pairs(target: &CellBuffer, mut region: Rect) -> Rect {
    if region.is_empty() {
        return region;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rows = (region.y as u16)..(region.y as u16 + region.height);

    // Left edge: a continuation at region.x means its base sits just outside.
    while region.x > 0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let col = region.x as u16;
        let split = rows
            .clone()
            .any(|row| target.get_cell(col, row).is_continuation());
        if !split {
            break;
        }
        region.x -= 1;
        region.width += 1;
    }

    // Right edge: a wide base in the last column owns the next one.
    loop {
        let right = region.right();
        if right >= i32::from(target.size().cols) {
            break;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let last_col = (right - 1) as u16;
        let split = rows
            .clone()
            .any(|row| is_wide(target.get_cell(last_col, row).ch));
        if !split {
            break;
        }
        region.width += 1;
    }
    region
}

/// Write one source cell into the target with transparency and
/// wide-character integrity.
fn write_composed(target: &mut CellBuffer, x: i32, y: i32, cell: &Cell) {
    let size = target.size();
    let Some((col, row)) = to_target_coords(x, y, size) else {
        return;
    };

    if cell.is_continuation() {
        // The base to the left did (or will do) the write. The one exception:
        // a dirty-region boundary split the pair and the base survives in the
        // target just left of the region. Restore its continuation.
        if !cell.is_transparent()
            && col > 0
            && is_wide(target.get_cell(col - 1, row).ch)
        {
            target.set_cell(col, row, cell.clone());
        }
        return;
    }
    if cell.is_transparent() {
        return;
    }

    if is_wide(cell.ch) {
        if col + 1 >= size.cols {
            // A wide base cannot straddle the right edge.
            let mut space = cell.clone();
            space.ch = ' ';
            space.combining.clear();
            blank_orphan_halves(target, col, row);
            target.set_cell(col, row, space);
            return;
        }
        blank_orphan_halves(target, col, row);
        blank_orphan_halves(target, col + 1, row);
        let continuation = Cell::continuation_of(cell);
        target.set_cell(col, row, cell.clone());
        target.set_cell(col + 1, row, continuation);
    } else {
        blank_orphan_halves(target, col, row);
        target.set_cell(col, row, cell.clone());
    }
}

/// An opaque write is about to land on `(col, row)`. If that column currently
/// holds half of a wide pair, blank the *other* half so no orphan base or
/// continuation remains.
fn blank_orphan_halves(target: &mut CellBuffer, col: u16, row: u16) {
    let current = target.get_cell(col, row);
    if current.is_continuation() {
        if col > 0 {
            let base = target.get_cell(col - 1, row);
            if is_wide(base.ch) {
                let mut space = base.clone();
                space.ch = ' ';
                space.combining.clear();
                target.set_cell(col - 1, row, space);
            }
        }
    } else if is_wide(current.ch) {
        let next_col = col + 1;
        if target.get_cell(next_col, row).is_continuation() {
            let mut space = current.clone();
            space.ch = ' ';
            space.combining.clear();
            target.set_cell(next_col, row, space);
        }
    }
}

fn to_target_coords(x: i32, y: i32, size: Size) -> Option<(u16, u16)> {
    if x < 0 || y < 0 {
        return None;
    }
    let col = u16::try_from(x).ok()?;
    let row = u16::try_from(y).ok()?;
    if col < size.cols && row < size.rows {
        Some((col, row))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color, Style};
    use crate::units::Pos;
    use pretty_assertions::assert_eq;

    fn compose_setup(cols: u16, rows: u16) -> (PlaneTree, CellBuffer) {
        let size = Size::new(cols, rows);
        (PlaneTree::new(size), CellBuffer::new(size))
    }

    #[test]
    fn first_compose_covers_full_target() {
        let (mut tree, mut target) = compose_setup(10, 4);
        let regions = tree.compose(&mut target);
        assert_eq!(regions, vec![Rect::new(0, 0, 10, 4)]);
    }

    #[test]
    fn no_changes_compose_returns_empty() {
        let (mut tree, mut target) = compose_setup(10, 4);
        let _ = tree.compose(&mut target);
        assert_eq!(tree.compose(&mut target), Vec::new());
    }

    #[test]
    fn overlay_transparency_shows_underlay() {
        // Root prints BACKGROUND; the overlay writes X at columns 0, 2, 4
        // only.
        let (mut tree, mut target) = compose_setup(10, 1);
        let root = tree.root();
        tree.buffer_mut(root)
            .expect("root is live")
            .print(Pos::new(0, 0), "BACKGROUND", Style::default());

        let overlay = tree
            .create_plane(root, Rect::new(0, 0, 10, 1))
            .expect("create");
        let overlay_buf = tree.buffer_mut(overlay).expect("overlay is live");
        for col in [0u16, 2, 4] {
            overlay_buf.set_cell(col, 0, Cell::new('X', Style::default()));
        }

        let _ = tree.compose(&mut target);
        assert_eq!(target.row_text(0), "XAXKXROUND");
    }

    #[test]
    fn opaque_background_covers_even_with_space_char() {
        let (mut tree, mut target) = compose_setup(6, 1);
        let root = tree.root();
        tree.buffer_mut(root)
            .expect("root")
            .print(Pos::new(0, 0), "abcdef", Style::default());

        let overlay = tree
            .create_plane(root, Rect::new(0, 0, 3, 1))
            .expect("create");
        let style = Style {
            bg: Color::BLUE,
            ..Style::default()
        };
        tree.buffer_mut(overlay)
            .expect("overlay")
            .print(Pos::new(0, 0), "   ", style);

        let _ = tree.compose(&mut target);
        assert_eq!(target.get_cell(0, 0).ch, ' ');
        assert_eq!(target.get_cell(0, 0).bg, Color::BLUE);
        assert_eq!(target.get_cell(3, 0).ch, 'd');
    }

    #[test]
    fn z_order_respects_raise() {
        let (mut tree, mut target) = compose_setup(4, 1);
        let root = tree.root();
        let a = tree.create_plane(root, Rect::new(0, 0, 4, 1)).expect("a");
        let b = tree.create_plane(root, Rect::new(0, 0, 4, 1)).expect("b");
        tree.buffer_mut(a)
            .expect("a")
            .print(Pos::new(0, 0), "aaaa", Style::default());
        tree.buffer_mut(b)
            .expect("b")
            .print(Pos::new(0, 0), "bbbb", Style::default());

        let _ = tree.compose(&mut target);
        assert_eq!(target.row_text(0), "bbbb");

        tree.raise(a);
        let _ = tree.compose(&mut target);
        assert_eq!(target.row_text(0), "aaaa");
    }

    #[test]
    fn hiding_a_plane_restores_the_underlay() {
        let (mut tree, mut target) = compose_setup(6, 1);
        let root = tree.root();
        tree.buffer_mut(root)
            .expect("root")
            .print(Pos::new(0, 0), "under!", Style::default());
        let overlay = tree
            .create_plane(root, Rect::new(0, 0, 6, 1))
            .expect("create");
        tree.buffer_mut(overlay)
            .expect("overlay")
            .print(Pos::new(0, 0), "OVERLA", Style::default());

        let _ = tree.compose(&mut target);
        assert_eq!(target.row_text(0), "OVERLA");

        tree.set_visible(overlay, false);
        let regions = tree.compose(&mut target);
        assert!(!regions.is_empty());
        assert_eq!(target.row_text(0), "under!");
    }

    #[test]
    fn moving_a_plane_dirties_old_and_new_positions() {
        let (mut tree, mut target) = compose_setup(10, 1);
        let root = tree.root();
        let plane = tree
            .create_plane(root, Rect::new(0, 0, 2, 1))
            .expect("create");
        tree.buffer_mut(plane)
            .expect("plane")
            .print(Pos::new(0, 0), "##", Style::default());
        let _ = tree.compose(&mut target);
        assert_eq!(target.row_text(0), "##");

        tree.move_to(plane, 5, 0);
        let _ = tree.compose(&mut target);
        assert_eq!(target.get_cell(0, 0).ch, '\0');
        assert_eq!(target.get_cell(5, 0).ch, '#');
    }

    #[test]
    fn negative_offsets_clip_to_target() {
        let (mut tree, mut target) = compose_setup(4, 2);
        let root = tree.root();
        let plane = tree
            .create_plane(root, Rect::new(-1, 0, 3, 1))
            .expect("create");
        tree.buffer_mut(plane)
            .expect("plane")
            .print(Pos::new(0, 0), "xyz", Style::default());
        let _ = tree.compose(&mut target);
        // 'x' is off-screen; 'y' and 'z' land at columns 0 and 1.
        assert_eq!(target.get_cell(0, 0).ch, 'y');
        assert_eq!(target.get_cell(1, 0).ch, 'z');
    }

    #[test]
    fn wide_base_at_target_edge_degrades_to_space() {
        let (mut tree, mut target) = compose_setup(4, 1);
        let root = tree.root();
        let plane = tree
            .create_plane(root, Rect::new(3, 0, 2, 1))
            .expect("create");
        tree.buffer_mut(plane)
            .expect("plane")
            .print(Pos::new(0, 0), "中", Style::default());
        let _ = tree.compose(&mut target);
        assert_eq!(target.get_cell(3, 0).ch, ' ');
    }

    #[test]
    fn narrow_overlay_on_wide_base_blanks_the_pair() {
        let (mut tree, mut target) = compose_setup(6, 1);
        let root = tree.root();
        tree.buffer_mut(root)
            .expect("root")
            .print(Pos::new(0, 0), "中ab", Style::default());
        // Overlay covers only the continuation column (column 1).
        let overlay = tree
            .create_plane(root, Rect::new(1, 0, 1, 1))
            .expect("create");
        tree.buffer_mut(overlay)
            .expect("overlay")
            .set_cell(0, 0, Cell::new('!', Style::default()));

        let _ = tree.compose(&mut target);
        // The wide base lost its continuation and must not survive as an
        // orphan.
        assert_eq!(target.get_cell(0, 0).ch, ' ');
        assert_eq!(target.get_cell(1, 0).ch, '!');
        assert_eq!(target.get_cell(2, 0).ch, 'a');
    }

    #[test]
    fn resize_recomposes_everything() {
        let (mut tree, mut target) = compose_setup(4, 2);
        let _ = tree.compose(&mut target);
        tree.set_target_size(Size::new(8, 3));
        let regions = tree.compose(&mut target);
        assert_eq!(regions, vec![Rect::new(0, 0, 8, 3)]);
        assert_eq!(target.size(), Size::new(8, 3));
    }
}
