use std::collections::{HashSet, VecDeque};

use crate::canvas::{Surface, TiledImage};

/// Default number of retained history entries.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// What produced a history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    /// Fresh page or session.
    Initial,
    Stroke,
    Eraser,
    Shape,
    Stamp,
    Fill,
    Clear,
}

impl EditKind {
    pub fn label(&self) -> &'static str {
        match self {
            EditKind::Initial => "New Page",
            EditKind::Stroke => "Brush Stroke",
            EditKind::Eraser => "Eraser",
            EditKind::Shape => "Shape",
            EditKind::Stamp => "Stamp",
            EditKind::Fill => "Bucket Fill",
            EditKind::Clear => "Clear",
        }
    }
}

/// One immutable saved copy of the surface.
///
/// The copy shares tiles with the live surface until either side writes
/// (see [`TiledImage`]), so taking it costs O(tiles), and no later edit can
/// reach into it.
#[derive(Clone)]
pub struct HistoryEntry {
    kind: EditKind,
    pixels: TiledImage,
}

impl HistoryEntry {
    fn capture(kind: EditKind, surface: &Surface) -> Self {
        Self {
            kind,
            pixels: surface.pixels().clone(),
        }
    }

    pub fn kind(&self) -> EditKind {
        self.kind
    }
}

// ============================================================================
// HISTORY MANAGER
// ============================================================================

/// Linear undo/redo over post-edit snapshots.
///
/// `entries[cursor]` is always the surface as it was right after the last
/// commit or navigation. Committing after an undo drops everything past the
/// cursor; there is no branching. When more than `max_entries` are held the
/// oldest ones are evicted, so undo never reaches further back than that.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    max_entries: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl HistoryManager {
    /// Empty history. Call [`reset`](Self::reset) with the starting surface
    /// before the first edit. `max_entries` is clamped to at least 1.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Discard everything and start over from `surface` (page switch, new
    /// session, line-art load). The first undo afterwards is a no-op.
    pub fn reset(&mut self, surface: &Surface) {
        self.entries.clear();
        self.entries.push_back(HistoryEntry::capture(EditKind::Initial, surface));
        self.cursor = 0;
    }

    /// Record the surface right after a completed edit. On an empty history
    /// the entry becomes the baseline.
    pub fn snapshot(&mut self, kind: EditKind, surface: &Surface) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(HistoryEntry::capture(kind, surface));
        self.cursor = self.entries.len() - 1;
        self.prune();
    }

    /// Step back one entry and restore it. Returns the kind of the edit that
    /// was undone, or `None` when already at the oldest entry.
    pub fn undo(&mut self, surface: &mut Surface) -> Option<EditKind> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        let undone = self.entries[self.cursor].kind;
        self.cursor -= 1;
        surface.restore(&self.entries[self.cursor].pixels);
        Some(undone)
    }

    /// Step forward one entry and restore it. Returns the kind of the edit
    /// that was redone, or `None` when already at the newest entry.
    pub fn redo(&mut self, surface: &mut Surface) -> Option<EditKind> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        let entry = &self.entries[self.cursor];
        surface.restore(&entry.pixels);
        Some(entry.kind)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Label of the edit the next undo would revert.
    pub fn undo_description(&self) -> Option<&'static str> {
        self.can_undo().then(|| self.entries[self.cursor].kind.label())
    }

    /// Label of the edit the next redo would re-apply.
    pub fn redo_description(&self) -> Option<&'static str> {
        self.can_redo().then(|| self.entries[self.cursor + 1].kind.label())
    }

    /// Number of retained entries (including the current one).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    /// Pixel bytes held by the history, counting each shared tile once.
    pub fn memory_usage(&self) -> usize {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            seen.extend(entry.pixels.chunk_addresses());
        }
        seen.len() * TiledImage::chunk_bytes()
    }

    /// Evict the oldest entries beyond the cap. The cursor entry is always
    /// the newest after a snapshot, so it survives.
    fn prune(&mut self) {
        let mut evicted = 0;
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
            evicted += 1;
        }
        if evicted > 0 {
            crate::log_info!("History: evicted {} oldest entries (cap {})", evicted, self.max_entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn ink(i: u8) -> Rgba<u8> {
        Rgba([i, 0, 0, 255])
    }

    fn fresh() -> (Surface, HistoryManager) {
        let s = Surface::new(8, 8, WHITE).unwrap();
        let mut h = HistoryManager::new(10);
        h.reset(&s);
        (s, h)
    }

    #[test]
    fn first_undo_after_reset_is_noop() {
        let (mut s, mut h) = fresh();
        assert_eq!(h.len(), 1);
        assert!(!h.can_undo());
        assert_eq!(h.undo(&mut s), None);
        assert_eq!(h.redo(&mut s), None);
    }

    #[test]
    fn undo_restores_previous_state_and_redo_returns() {
        let (mut s, mut h) = fresh();
        s.set_pixel(1, 1, ink(1));
        h.snapshot(EditKind::Stroke, &s);
        s.set_pixel(2, 2, ink(2));
        h.snapshot(EditKind::Fill, &s);

        assert_eq!(h.undo_description(), Some("Bucket Fill"));
        assert_eq!(h.undo(&mut s), Some(EditKind::Fill));
        assert_eq!(s.get_pixel(2, 2), WHITE);
        assert_eq!(s.get_pixel(1, 1), ink(1));

        assert_eq!(h.redo(&mut s), Some(EditKind::Fill));
        assert_eq!(s.get_pixel(2, 2), ink(2));
        assert!(!h.can_redo());
    }

    #[test]
    fn new_edit_after_undo_truncates_redo() {
        let (mut s, mut h) = fresh();
        for i in 1..=3 {
            s.set_pixel(i, 0, ink(i as u8));
            h.snapshot(EditKind::Stroke, &s);
        }
        h.undo(&mut s);
        h.undo(&mut s);
        s.set_pixel(7, 7, ink(9));
        h.snapshot(EditKind::Shape, &s);

        assert_eq!(h.len(), 3);
        assert!(!h.can_redo());
        assert_eq!(h.redo(&mut s), None);
        assert_eq!(s.get_pixel(2, 0), WHITE);
        assert_eq!(s.get_pixel(7, 7), ink(9));
    }

    #[test]
    fn entries_are_not_corrupted_by_later_edits() {
        let (mut s, mut h) = fresh();
        s.set_pixel(3, 3, ink(3));
        h.snapshot(EditKind::Stroke, &s);
        // Mutate the live surface without committing, then navigate back
        s.set_pixel(3, 3, ink(200));
        s.set_pixel(4, 4, ink(200));
        h.undo(&mut s);
        h.redo(&mut s);
        assert_eq!(s.get_pixel(3, 3), ink(3));
        assert_eq!(s.get_pixel(4, 4), WHITE);
    }

    #[test]
    fn cap_evicts_oldest_and_keeps_current() {
        let mut s = Surface::new(4, 4, WHITE).unwrap();
        let mut h = HistoryManager::new(3);
        h.reset(&s);
        for i in 0..5u8 {
            s.set_pixel(i as i32 % 4, 0, ink(i + 1));
            h.snapshot(EditKind::Stroke, &s);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.cursor(), 2);
        assert_eq!(h.undo(&mut s), Some(EditKind::Stroke));
        assert_eq!(h.undo(&mut s), Some(EditKind::Stroke));
        assert_eq!(h.undo(&mut s), None);
        // Oldest retained state: after the third edit
        assert_eq!(s.get_pixel(2, 0), ink(3));
        assert_eq!(s.get_pixel(3, 0), WHITE);
    }

    #[test]
    fn snapshot_without_reset_becomes_baseline() {
        let mut s = Surface::new(4, 4, WHITE).unwrap();
        let mut h = HistoryManager::default();
        s.set_pixel(0, 0, ink(1));
        h.snapshot(EditKind::Fill, &s);
        assert_eq!(h.len(), 1);
        assert!(!h.can_undo());
        assert_eq!(h.current().map(|e| e.kind()), Some(EditKind::Fill));
    }

    #[test]
    fn memory_counts_shared_tiles_once() {
        let (mut s, mut h) = fresh();
        let one_tile = TiledImage::chunk_bytes();
        assert_eq!(h.memory_usage(), one_tile);
        s.set_pixel(0, 0, ink(1));
        h.snapshot(EditKind::Stroke, &s);
        assert_eq!(h.memory_usage(), 2 * one_tile);
    }
}
