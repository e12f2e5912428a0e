// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The plane arena: records, stable IDs, geometry/visibility/z-order
//! operations, and dirty-region bookkeeping.

use crate::buffer::CellBuffer;
use crate::units::{Rect, Size};

/// Stable handle to a plane. Generation-checked: operations on a removed
/// plane's stale ID are silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId {
    index: u32,
    generation: u32,
}

/// One plane record in the arena.
#[derive(Debug)]
pub(crate) struct PlaneRecord {
    pub(crate) buffer: CellBuffer,
    /// Offset relative to the parent plane (signed: planes may hang off any
    /// edge).
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) visible: bool,
    pub(crate) parent: Option<PlaneId>,
    /// Bottom-up z-order: index 0 composes first (bottommost).
    pub(crate) children: Vec<PlaneId>,
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) record: Option<PlaneRecord>,
}

/// Accumulated dirty rectangles, coalesced on insert when they overlap.
#[derive(Debug, Default)]
pub(crate) struct DirtyList {
    rects: Vec<Rect>,
}

impl DirtyList {
    pub(crate) fn push(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut merged = rect;
        // Union every overlapping rectangle into the incoming one; repeat in
        // case the union grew into a previously disjoint neighbor.
        loop {
            let before = self.rects.len();
            self.rects.retain(|existing| {
                if existing.overlaps(merged) {
                    merged = merged.union(*existing);
                    false
                } else {
                    true
                }
            });
            if self.rects.len() == before {
                break;
            }
        }
        self.rects.push(merged);
    }

    pub(crate) fn take(&mut self) -> Vec<Rect> { std::mem::take(&mut self.rects) }

    pub(crate) fn is_empty(&self) -> bool { self.rects.is_empty() }
}

/// The plane tree: a full-screen root plus z-ordered descendants.
#[derive(Debug)]
pub struct PlaneTree {
    pub(crate) slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) root: PlaneId,
    pub(crate) target_size: Size,
    pub(crate) dirty: DirtyList,
    pub(crate) composed_once: bool,
}

impl PlaneTree {
    /// Create the tree with a root plane filling `target_size`.
    #[must_use]
    pub fn new(target_size: Size) -> Self {
        let root = PlaneId {
            index: 0,
            generation: 0,
        };
        let root_record = PlaneRecord {
            buffer: CellBuffer::new(target_size),
            x: 0,
            y: 0,
            visible: true,
            parent: None,
            children: Vec::new(),
        };
        PlaneTree {
            slots: vec![Slot {
                generation: 0,
                record: Some(root_record),
            }],
            free: Vec::new(),
            root,
            target_size,
            dirty: DirtyList::default(),
            composed_once: false,
        }
    }

    #[must_use]
    pub fn root(&self) -> PlaneId { self.root }

    #[must_use]
    pub fn target_size(&self) -> Size { self.target_size }

    pub(crate) fn record(&self, id: PlaneId) -> Option<&PlaneRecord> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref()
    }

    fn record_mut(&mut self, id: PlaneId) -> Option<&mut PlaneRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_mut()
    }

    /// Create a plane under `parent` with the given geometry (offset relative
    /// to the parent). New planes are visible and topmost among siblings.
    ///
    /// Returns `None` when `parent` is stale.
    pub fn create_plane(&mut self, parent: PlaneId, rect: Rect) -> Option<PlaneId> {
        self.record(parent)?;

        let record = PlaneRecord {
            buffer: CellBuffer::new(Size::new(rect.width, rect.height)),
            x: rect.x,
            y: rect.y,
            visible: true,
            parent: Some(parent),
            children: Vec::new(),
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.record = Some(record);
                PlaneId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                PlaneId {
                    index,
                    generation: 0,
                }
            }
        };

        if let Some(parent_record) = self.record_mut(parent) {
            parent_record.children.push(id);
        }
        self.invalidate(id);
        Some(id)
    }

    /// Remove a plane and all of its descendants. The root cannot be removed.
    pub fn remove_plane(&mut self, id: PlaneId) {
        if id == self.root || self.record(id).is_none() {
            return;
        }
        self.invalidate(id);

        // Detach from the parent's child list.
        if let Some(parent) = self.record(id).and_then(|r| r.parent)
            && let Some(parent_record) = self.record_mut(parent)
        {
            parent_record.children.retain(|&child| child != id);
        }

        // Tear down the subtree iteratively; each removed slot bumps its
        // generation so stale IDs die.
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(record) = slot.record.take() {
                stack.extend(record.children);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
        }
    }

    /// On-screen rectangle of a plane: its absolute geometry clipped to the
    /// target buffer. Ancestor geometry does not clip, only the target does.
    #[must_use]
    pub fn screen_rect(&self, id: PlaneId) -> Rect {
        let Some(record) = self.record(id) else {
            return Rect::default();
        };
        let (origin_x, origin_y) = self.absolute_origin(id);
        let size = record.buffer.size();
        Rect::new(origin_x, origin_y, size.cols, size.rows)
            .intersect(Rect::from(self.target_size))
    }

    /// Absolute origin: the plane's offset accumulated through its ancestors.
    pub(crate) fn absolute_origin(&self, id: PlaneId) -> (i32, i32) {
        let mut x = 0i32;
        let mut y = 0i32;
        let mut current = Some(id);
        while let Some(cursor) = current {
            let Some(record) = self.record(cursor) else {
                break;
            };
            x += record.x;
            y += record.y;
            current = record.parent;
        }
        (x, y)
    }

    /// Mark a plane's current on-screen rectangle dirty.
    pub fn invalidate(&mut self, id: PlaneId) {
        let rect = self.screen_rect(id);
        self.dirty.push(rect);
    }

    /// Move a plane to a new offset relative to its parent. Dirties the union
    /// of the old and new on-screen rectangles.
    pub fn move_to(&mut self, id: PlaneId, x: i32, y: i32) {
        if self.record(id).is_none() {
            return;
        }
        self.invalidate(id);
        if let Some(record) = self.record_mut(id) {
            record.x = x;
            record.y = y;
        }
        self.invalidate(id);
    }

    /// Resize a plane's buffer. Contents are reset to transparent.
    pub fn resize_plane(&mut self, id: PlaneId, size: Size) {
        if self.record(id).is_none() {
            return;
        }
        self.invalidate(id);
        if let Some(record) = self.record_mut(id) {
            record.buffer.resize(size);
        }
        self.invalidate(id);
    }

    /// Show or hide a plane. Hiding dirties the region the plane covered
    /// while it was still visible, so the underlay is recomposed there.
    pub fn set_visible(&mut self, id: PlaneId, visible: bool) {
        if self.record(id).is_none() {
            return;
        }
        self.invalidate(id);
        if let Some(record) = self.record_mut(id) {
            record.visible = visible;
        }
    }

    #[must_use]
    pub fn is_visible(&self, id: PlaneId) -> bool {
        self.record(id).is_some_and(|r| r.visible)
    }

    /// Move a plane to the top of its siblings (composed last).
    pub fn raise(&mut self, id: PlaneId) {
        self.reorder(id, |children, pos| {
            let child = children.remove(pos);
            children.push(child);
        });
    }

    /// Move a plane to the bottom of its siblings (composed first).
    pub fn lower(&mut self, id: PlaneId) {
        self.reorder(id, |children, pos| {
            let child = children.remove(pos);
            children.insert(0, child);
        });
    }

    fn reorder(&mut self, id: PlaneId, shuffle: impl Fn(&mut Vec<PlaneId>, usize)) {
        let Some(parent) = self.record(id).and_then(|r| r.parent) else {
            return;
        };
        if let Some(parent_record) = self.record_mut(parent)
            && let Some(pos) = parent_record.children.iter().position(|&c| c == id)
        {
            shuffle(&mut parent_record.children, pos);
            self.invalidate(id);
        }
    }

    /// Drawable surface of a plane. Marks the plane's on-screen rectangle
    /// dirty, since content mutation is assumed.
    pub fn buffer_mut(&mut self, id: PlaneId) -> Option<&mut CellBuffer> {
        self.record(id)?;
        self.invalidate(id);
        self.record_mut(id).map(|record| &mut record.buffer)
    }

    /// Read-only view of a plane's buffer.
    #[must_use]
    pub fn buffer(&self, id: PlaneId) -> Option<&CellBuffer> {
        self.record(id).map(|record| &record.buffer)
    }

    /// The terminal resized: the root plane grows to fill it and everything
    /// is recomposed.
    pub fn set_target_size(&mut self, size: Size) {
        self.target_size = size;
        let root = self.root;
        if let Some(record) = self.record_mut(root) {
            record.buffer.resize(size);
        }
        self.dirty.push(Rect::from(size));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stale_ids_are_ignored() {
        let mut tree = PlaneTree::new(Size::new(20, 10));
        let plane = tree
            .create_plane(tree.root(), Rect::new(1, 1, 5, 3))
            .expect("root is live");
        tree.remove_plane(plane);
        assert!(tree.buffer(plane).is_none());
        // All of these are silent no-ops on the stale ID.
        tree.move_to(plane, 9, 9);
        tree.set_visible(plane, false);
        tree.remove_plane(plane);
        assert!(tree.create_plane(plane, Rect::new(0, 0, 1, 1)).is_none());
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut tree = PlaneTree::new(Size::new(20, 10));
        let first = tree
            .create_plane(tree.root(), Rect::new(0, 0, 2, 2))
            .expect("create");
        tree.remove_plane(first);
        let second = tree
            .create_plane(tree.root(), Rect::new(0, 0, 2, 2))
            .expect("create");
        assert_ne!(first, second);
        assert!(tree.buffer(first).is_none());
        assert!(tree.buffer(second).is_some());
    }

    #[test]
    fn removal_is_recursive() {
        let mut tree = PlaneTree::new(Size::new(20, 10));
        let parent = tree
            .create_plane(tree.root(), Rect::new(0, 0, 8, 8))
            .expect("create");
        let child = tree
            .create_plane(parent, Rect::new(1, 1, 4, 4))
            .expect("create");
        tree.remove_plane(parent);
        assert!(tree.buffer(parent).is_none());
        assert!(tree.buffer(child).is_none());
    }

    #[test]
    fn screen_rect_clips_to_target_only() {
        let mut tree = PlaneTree::new(Size::new(10, 10));
        // Parent is tiny, child hangs far outside it: the parent does NOT
        // clip, only the target does.
        let parent = tree
            .create_plane(tree.root(), Rect::new(0, 0, 2, 2))
            .expect("create");
        let child = tree
            .create_plane(parent, Rect::new(5, 5, 4, 4))
            .expect("create");
        assert_eq!(tree.screen_rect(child), Rect::new(5, 5, 4, 4));

        // Negative offsets clip at the target's top-left.
        let hanging = tree
            .create_plane(tree.root(), Rect::new(-2, -1, 4, 4))
            .expect("create");
        assert_eq!(tree.screen_rect(hanging), Rect::new(0, 0, 2, 3));
    }

    #[test]
    fn dirty_rects_coalesce_on_overlap() {
        let mut dirty = DirtyList::default();
        dirty.push(Rect::new(0, 0, 4, 4));
        dirty.push(Rect::new(2, 2, 4, 4));
        dirty.push(Rect::new(20, 20, 2, 2));
        let rects = dirty.take();
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rect::new(0, 0, 6, 6));
        assert_eq!(rects[1], Rect::new(20, 20, 2, 2));
    }

    #[test]
    fn raise_and_lower_reorder_siblings() {
        let mut tree = PlaneTree::new(Size::new(10, 10));
        let a = tree
            .create_plane(tree.root(), Rect::new(0, 0, 2, 2))
            .expect("create");
        let b = tree
            .create_plane(tree.root(), Rect::new(0, 0, 2, 2))
            .expect("create");
        let children = |tree: &PlaneTree| {
            tree.record(tree.root())
                .map(|r| r.children.clone())
                .unwrap_or_default()
        };
        assert_eq!(children(&tree), vec![a, b]);
        tree.raise(a);
        assert_eq!(children(&tree), vec![b, a]);
        tree.lower(a);
        assert_eq!(children(&tree), vec![a, b]);
    }
}
