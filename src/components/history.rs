use std::collections::{HashSet, VecDeque};

use image::Rgba;

use crate::canvas::CanvasState;
use crate::error::EditError;

// ============================================================================
// STROKE ACTION — one reversible edit, pixel deltas coalesced per cell
// ============================================================================

/// A single cell's before/after values within one action.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelChange {
    pub x: u32,
    pub y: u32,
    pub old: Rgba<u8>,
    pub new: Rgba<u8>,
}

/// One undoable edit: a pointer stroke or a bulk recolor. Holds at most one
/// delta per cell; `old` is always the value from before the action began.
pub struct StrokeAction {
    label: String,
    changes: Vec<PixelChange>,
}

impl StrokeAction {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            changes: Vec::new(),
        }
    }

    /// Build a bulk action from a pre-computed list of deltas (whole-buffer
    /// diff). The caller guarantees at most one entry per cell.
    pub fn with_changes(label: impl Into<String>, changes: Vec<PixelChange>) -> Self {
        Self {
            label: label.into(),
            changes,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn apply(&self, canvas: &mut CanvasState) {
        for c in &self.changes {
            canvas.set(c.x, c.y, c.new);
        }
    }

    fn revert(&self, canvas: &mut CanvasState) {
        for c in &self.changes {
            canvas.set(c.x, c.y, c.old);
        }
    }
}

// ============================================================================
// HISTORY MANAGER — stroke recording + linear undo/redo stacks
// ============================================================================

/// Records strokes and manages the undo/redo stacks.
///
/// A stroke is strictly `begin_stroke()` → zero or more `paint()` →
/// `commit_stroke()`; there is never more than one stroke open. Commit
/// pushes one action for the whole stroke, so a drag across hundreds of
/// cells undoes in a single step. Bulk recolors enter through
/// [`HistoryManager::apply_bulk`] and get the same one-step guarantee.
pub struct HistoryManager {
    undo_stack: VecDeque<StrokeAction>,
    redo_stack: VecDeque<StrokeAction>,
    max_depth: usize,
    current: Option<StrokeAction>,
    /// Cells already recorded in the open stroke.
    touched: HashSet<(u32, u32)>,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            current: None,
            touched: HashSet::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.current.is_some()
    }

    /// Open a stroke. Errors if one is already open — overlapping strokes
    /// would corrupt the per-cell coalescing.
    pub fn begin_stroke(&mut self) -> Result<(), EditError> {
        if self.current.is_some() {
            return Err(EditError::Validation(
                "a stroke is already in progress".into(),
            ));
        }
        self.current = Some(StrokeAction::new("Stroke"));
        self.touched.clear();
        Ok(())
    }

    /// Paint one cell inside the open stroke.
    ///
    /// No-op when `color` equals the cell's current value or the coordinate
    /// is outside the canvas (the pointer leaving the grid mid-drag). The
    /// first touch of a cell records its pre-stroke value as `old`; any
    /// later touch only updates `new`, so undo restores the color from
    /// before the stroke began no matter how often the cell was repainted.
    pub fn paint(
        &mut self,
        canvas: &mut CanvasState,
        x: u32,
        y: u32,
        color: Rgba<u8>,
    ) -> Result<(), EditError> {
        let stroke = self.current.as_mut().ok_or_else(|| {
            EditError::Validation("paint() called with no stroke in progress".into())
        })?;

        let Some(old) = canvas.get(x, y) else {
            return Ok(());
        };
        if old == color {
            return Ok(());
        }

        if self.touched.insert((x, y)) {
            stroke.changes.push(PixelChange {
                x,
                y,
                old,
                new: color,
            });
        } else if let Some(change) = stroke
            .changes
            .iter_mut()
            .rev()
            .find(|c| c.x == x && c.y == y)
        {
            change.new = color;
        }

        canvas.set(x, y, color);
        Ok(())
    }

    /// Close the open stroke. A stroke that changed at least one cell is
    /// pushed as one undo step (clearing redo) and `true` is returned; an
    /// empty stroke is discarded silently. Committing with no open stroke
    /// is a no-op.
    pub fn commit_stroke(&mut self) -> bool {
        self.touched.clear();
        match self.current.take() {
            Some(stroke) if !stroke.is_empty() => {
                self.redo_stack.clear();
                self.undo_stack.push_back(stroke);
                self.prune();
                true
            }
            _ => false,
        }
    }

    /// Apply a fully-computed bulk action: write its `new` values and push
    /// it as one undo step. An open stroke is committed first so ordering
    /// stays linear. Returns the number of cells changed (0 = nothing
    /// pushed).
    pub fn apply_bulk(&mut self, canvas: &mut CanvasState, action: StrokeAction) -> usize {
        self.commit_stroke();
        if action.is_empty() {
            return 0;
        }
        let n = action.len();
        action.apply(canvas);
        self.redo_stack.clear();
        self.undo_stack.push_back(action);
        self.prune();
        n
    }

    /// Undo the most recent action, committing any open stroke first.
    /// Returns the undone action's label, or `None` when there is nothing
    /// to undo.
    pub fn undo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        if self.current.is_some() {
            self.commit_stroke();
        }
        let action = self.undo_stack.pop_back()?;
        action.revert(canvas);
        let label = action.label.clone();
        self.redo_stack.push_back(action);
        Some(label)
    }

    /// Re-apply the most recently undone action. `None` when the redo stack
    /// is empty.
    pub fn redo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        let action = self.redo_stack.pop_back()?;
        action.apply(canvas);
        let label = action.label.clone();
        self.undo_stack.push_back(action);
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
            || self.current.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Labels of pending undo steps, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|a| a.label.clone()).collect()
    }

    /// Drop all history, including any open stroke. Required after a
    /// structural canvas replacement (resize, snapshot restore) because the
    /// recorded coordinates no longer address the same cells.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current = None;
        self.touched.clear();
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{TRANSPARENT, is_opaque, opaque};

    fn setup() -> (CanvasState, HistoryManager) {
        (CanvasState::new(4, 4, 4096).unwrap(), HistoryManager::new(50))
    }

    #[test]
    fn stroke_paints_and_undoes() {
        let (mut canvas, mut history) = setup();
        history.begin_stroke().unwrap();
        history.paint(&mut canvas, 1, 1, opaque([255, 0, 0])).unwrap();
        history.paint(&mut canvas, 2, 1, opaque([255, 0, 0])).unwrap();
        assert!(history.commit_stroke());

        assert_eq!(canvas.opaque_count(), 2);
        assert_eq!(history.undo(&mut canvas).as_deref(), Some("Stroke"));
        assert_eq!(canvas.opaque_count(), 0);
    }

    #[test]
    fn repainting_a_cell_coalesces_to_prestroke_old() {
        let (mut canvas, mut history) = setup();
        canvas.set(0, 0, opaque([9, 9, 9])); // pre-stroke color

        history.begin_stroke().unwrap();
        for c in [[1, 0, 0], [2, 0, 0], [3, 0, 0]] {
            history.paint(&mut canvas, 0, 0, opaque(c)).unwrap();
        }
        history.commit_stroke();
        assert_eq!(canvas.get(0, 0), Some(opaque([3, 0, 0])));

        // Undo restores the color from before the stroke, not [2,0,0].
        history.undo(&mut canvas);
        assert_eq!(canvas.get(0, 0), Some(opaque([9, 9, 9])));
    }

    #[test]
    fn undo_then_redo_round_trips_exactly() {
        let (mut canvas, mut history) = setup();
        history.begin_stroke().unwrap();
        history.paint(&mut canvas, 0, 0, opaque([1, 2, 3])).unwrap();
        history.paint(&mut canvas, 3, 3, opaque([4, 5, 6])).unwrap();
        history.commit_stroke();
        let applied = canvas.to_rgba_image();

        history.undo(&mut canvas);
        history.redo(&mut canvas);
        assert_eq!(canvas.to_rgba_image().as_raw(), applied.as_raw());

        history.redo(&mut canvas); // empty redo stack: no-op
        history.undo(&mut canvas);
        history.redo(&mut canvas);
        assert_eq!(canvas.to_rgba_image().as_raw(), applied.as_raw());
    }

    #[test]
    fn undo_flushes_open_stroke_first() {
        let (mut canvas, mut history) = setup();
        history.begin_stroke().unwrap();
        history.paint(&mut canvas, 2, 2, opaque([8, 8, 8])).unwrap();
        // No commit — undo must flush and then revert the stroke.
        assert!(history.undo(&mut canvas).is_some());
        assert!(!is_opaque(canvas.get(2, 2).unwrap()));
        assert!(!history.is_recording());
        assert!(history.can_redo());
    }

    #[test]
    fn undo_on_empty_history_is_a_noop() {
        let (mut canvas, mut history) = setup();
        assert_eq!(history.undo(&mut canvas), None);
        assert_eq!(history.redo(&mut canvas), None);
        assert!(!history.can_undo());
    }

    #[test]
    fn empty_stroke_commits_silently_without_history() {
        let (mut canvas, mut history) = setup();
        history.begin_stroke().unwrap();
        // Painting transparent over transparent records nothing.
        history.paint(&mut canvas, 0, 0, TRANSPARENT).unwrap();
        assert!(!history.commit_stroke());
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn commit_clears_redo_stack() {
        let (mut canvas, mut history) = setup();
        history.begin_stroke().unwrap();
        history.paint(&mut canvas, 0, 0, opaque([1, 1, 1])).unwrap();
        history.commit_stroke();
        history.undo(&mut canvas);
        assert!(history.can_redo());

        history.begin_stroke().unwrap();
        history.paint(&mut canvas, 1, 1, opaque([2, 2, 2])).unwrap();
        history.commit_stroke();
        assert!(!history.can_redo());
    }

    #[test]
    fn begin_while_recording_is_an_error() {
        let (_, mut history) = setup();
        history.begin_stroke().unwrap();
        assert!(history.begin_stroke().is_err());
    }

    #[test]
    fn paint_outside_a_stroke_is_an_error() {
        let (mut canvas, mut history) = setup();
        assert!(history.paint(&mut canvas, 0, 0, opaque([1, 1, 1])).is_err());
    }

    #[test]
    fn history_depth_is_capped() {
        let mut canvas = CanvasState::new(4, 4, 4096).unwrap();
        let mut history = HistoryManager::new(3);
        for i in 0..5u8 {
            history.begin_stroke().unwrap();
            history.paint(&mut canvas, 0, 0, opaque([i + 1, 0, 0])).unwrap();
            history.commit_stroke();
        }
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn out_of_bounds_paint_is_ignored() {
        let (mut canvas, mut history) = setup();
        history.begin_stroke().unwrap();
        history.paint(&mut canvas, 40, 40, opaque([1, 1, 1])).unwrap();
        assert!(!history.commit_stroke());
    }
}
