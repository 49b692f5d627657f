use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{Anchor, CanvasState, TRANSPARENT, opaque, validate_dimensions};
use crate::components::history::HistoryManager;
use crate::config::EditorConfig;
use crate::error::EditError;
use crate::ops::palette_ops::{self, CandidateSource, MergeOutcome, ReduceOutcome};
use crate::ops::quantize;
use crate::palette::{ActivePalette, ThreadColor};
use crate::pattern::Pattern;

// ============================================================================
// CHANGE NOTIFICATION
// ============================================================================

/// What kind of mutation just completed. Delivered through the single
/// per-project listener after derived state (usage counts, dirty flag) has
/// been brought up to date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A pointer stroke committed with at least one delta.
    StrokeCommitted,
    /// A bulk recolor (clear, import, reduce, merge) or an undo/redo.
    BulkEdit,
    /// The canvas was structurally replaced; undo history is gone.
    CanvasReplaced,
    /// The active palette changed without touching pixels.
    PaletteEdited,
}

pub type ChangeListener = Box<dyn FnMut(&ChangeEvent)>;

// ============================================================================
// PROJECT — one editing session
// ============================================================================

/// A single open document: canvas, undo history, active palette and the
/// session configuration, all exclusively owned.
///
/// Every mutation flows through the methods below — the UI layer never
/// edits the underlying collections directly — and each completed mutation
/// fires the one registered change listener exactly once.
pub struct Project {
    pub id: Uuid,
    pub name: String,
    config: EditorConfig,
    canvas: CanvasState,
    history: HistoryManager,
    active: ActivePalette,
    pub is_dirty: bool,

    /// Reference-layer display state. The image bytes are an opaque payload
    /// (typically PNG) owned by the host; the engine only stores and
    /// persists them.
    pub reference_png: Option<Vec<u8>>,
    pub reference_opacity: f32,
    pub reference_visible: bool,
    pub pixel_layer_opacity: f32,

    listener: Option<ChangeListener>,
}

impl Project {
    /// Fresh untitled document using the config's default canvas size.
    pub fn new_untitled(untitled_counter: usize, config: EditorConfig) -> Result<Self, EditError> {
        Self::with_canvas(
            format!("Untitled-{}", untitled_counter),
            config.default_canvas_width,
            config.default_canvas_height,
            config,
        )
    }

    pub fn with_canvas(
        name: impl Into<String>,
        width: u32,
        height: u32,
        config: EditorConfig,
    ) -> Result<Self, EditError> {
        let canvas = CanvasState::new(width, height, config.max_canvas_dim)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            canvas,
            history: HistoryManager::new(config.max_history_depth),
            active: ActivePalette::default(),
            is_dirty: false,
            reference_png: None,
            reference_opacity: config.reference_opacity,
            reference_visible: config.reference_visible,
            pixel_layer_opacity: config.pixel_layer_opacity,
            config,
            listener: None,
        })
    }

    // ---- accessors ---------------------------------------------------------

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn active_palette(&self) -> &ActivePalette {
        &self.active
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_history(&self) -> Vec<String> {
        self.history.undo_history()
    }

    /// Display name with the unsaved-changes marker.
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    // ---- change notification ----------------------------------------------

    /// Register the session's change listener. There is exactly one slot:
    /// setting a listener replaces any previous one, so a callback can never
    /// be attached twice and fire double side effects.
    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    pub fn clear_change_listener(&mut self) {
        self.listener = None;
    }

    /// Refresh derived state, mark dirty and fire the listener.
    fn notify(&mut self, event: ChangeEvent) {
        quantize::update_usage_counts(&self.canvas, &mut self.active);
        self.is_dirty = true;
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    // ---- strokes -----------------------------------------------------------

    pub fn begin_stroke(&mut self) -> Result<(), EditError> {
        self.history.begin_stroke()
    }

    /// Paint one cell with an opaque color inside the open stroke.
    pub fn paint(&mut self, x: u32, y: u32, rgb: [u8; 3]) -> Result<(), EditError> {
        self.history.paint(&mut self.canvas, x, y, opaque(rgb))
    }

    /// Erase one cell (paint transparent) inside the open stroke.
    pub fn erase(&mut self, x: u32, y: u32) -> Result<(), EditError> {
        self.history.paint(&mut self.canvas, x, y, TRANSPARENT)
    }

    /// Commit the open stroke. Fires the change listener only when the
    /// stroke actually changed something.
    pub fn commit_stroke(&mut self) -> bool {
        let changed = self.history.commit_stroke();
        if changed {
            self.notify(ChangeEvent::StrokeCommitted);
        }
        changed
    }

    /// Undo the latest action (flushing any open stroke first). `None` on
    /// an empty stack — a quiet no-op, not an error.
    pub fn undo(&mut self) -> Option<String> {
        let label = self.history.undo(&mut self.canvas)?;
        self.notify(ChangeEvent::BulkEdit);
        Some(label)
    }

    pub fn redo(&mut self) -> Option<String> {
        let label = self.history.redo(&mut self.canvas)?;
        self.notify(ChangeEvent::BulkEdit);
        Some(label)
    }

    // ---- canvas structure --------------------------------------------------

    /// Resize the canvas around `anchor`. This is a structural replacement:
    /// the undo history is cleared because recorded coordinates no longer
    /// address the same cells.
    pub fn resize_canvas(&mut self, new_w: u32, new_h: u32, anchor: Anchor) -> Result<(), EditError> {
        validate_dimensions(new_w, new_h, self.config.max_canvas_dim)?;
        self.canvas.resize(new_w, new_h, anchor);
        self.history.clear();
        self.notify(ChangeEvent::CanvasReplaced);
        Ok(())
    }

    /// Replace the canvas with a fresh transparent one. Clears history and
    /// the reference layer; the document starts clean again.
    pub fn new_canvas(&mut self, width: u32, height: u32) -> Result<(), EditError> {
        self.canvas = CanvasState::new(width, height, self.config.max_canvas_dim)?;
        self.history.clear();
        self.reference_png = None;
        quantize::update_usage_counts(&self.canvas, &mut self.active);
        if let Some(listener) = self.listener.as_mut() {
            listener(&ChangeEvent::CanvasReplaced);
        }
        self.is_dirty = false;
        Ok(())
    }

    /// Structural restore used by snapshot loading: adopt a prepared canvas
    /// and active palette wholesale.
    pub(crate) fn restore(&mut self, canvas: CanvasState, active: ActivePalette) {
        self.canvas = canvas;
        self.active = active;
        self.history.clear();
        quantize::update_usage_counts(&self.canvas, &mut self.active);
        self.is_dirty = false;
    }

    // ---- bulk edits --------------------------------------------------------

    /// Clear every opaque cell as one undo step.
    pub fn clear_canvas(&mut self) -> usize {
        let n = quantize::clear_with_undo(&mut self.canvas, &mut self.history);
        if n > 0 {
            self.notify(ChangeEvent::BulkEdit);
        }
        n
    }

    /// Import a decoded RGBA image, quantized to `catalog`, as one undo
    /// step. See [`quantize::import_quantized`].
    pub fn import_image(
        &mut self,
        source: &RgbaImage,
        catalog: &[ThreadColor],
    ) -> Result<usize, EditError> {
        let n = quantize::import_quantized(&mut self.canvas, &mut self.history, source, catalog)?;
        if n > 0 {
            self.notify(ChangeEvent::BulkEdit);
        }
        Ok(n)
    }

    // ---- palette operations ------------------------------------------------

    /// Rebuild the active palette from the `n` most-used catalog colours,
    /// preserving locked entries.
    pub fn build_active_from_canvas(
        &mut self,
        n: usize,
        catalog: &[ThreadColor],
    ) -> Result<usize, EditError> {
        let len = palette_ops::build_from_canvas(&self.canvas, catalog, &mut self.active, n)?;
        self.notify(ChangeEvent::PaletteEdited);
        Ok(len)
    }

    /// Reduce the working set to `n` colours and recolour the canvas, one
    /// undo step.
    pub fn reduce_colors(
        &mut self,
        n: usize,
        catalog: &[ThreadColor],
        source: CandidateSource,
    ) -> Result<ReduceOutcome, EditError> {
        let outcome = palette_ops::reduce_colors(
            &mut self.canvas,
            &mut self.history,
            catalog,
            &mut self.active,
            n,
            source,
        )?;
        self.notify(ChangeEvent::BulkEdit);
        Ok(outcome)
    }

    /// Merge one active colour into another; see
    /// [`palette_ops::merge_colors`].
    pub fn merge_colors(&mut self, keep_code: &str, drop_code: &str) -> Result<MergeOutcome, EditError> {
        let outcome = palette_ops::merge_colors(
            &mut self.canvas,
            &mut self.history,
            &mut self.active,
            keep_code,
            drop_code,
        )?;
        self.notify(ChangeEvent::BulkEdit);
        Ok(outcome)
    }

    // ---- manual palette curation -------------------------------------------

    /// Clone a catalog entry into the active set (deduplicated by code).
    pub fn add_active_color(&mut self, source: &ThreadColor) -> bool {
        let added = self.active.add_clone(source);
        if added {
            self.notify(ChangeEvent::PaletteEdited);
        }
        added
    }

    pub fn remove_active_color(&mut self, code: &str) -> bool {
        let removed = self.active.remove(code);
        if removed {
            self.notify(ChangeEvent::PaletteEdited);
        }
        removed
    }

    pub fn clear_active_palette(&mut self) {
        if !self.active.is_empty() {
            self.active.clear();
            self.notify(ChangeEvent::PaletteEdited);
        }
    }

    pub fn set_color_locked(&mut self, code: &str, locked: bool) -> bool {
        let changed = self.active.set_locked(code, locked);
        if changed {
            self.notify(ChangeEvent::PaletteEdited);
        }
        changed
    }

    pub fn set_color_symbol(&mut self, code: &str, symbol: impl Into<String>) -> bool {
        let changed = self.active.set_symbol(code, symbol);
        if changed {
            self.notify(ChangeEvent::PaletteEdited);
        }
        changed
    }

    /// Deal fresh symbols to the whole active set in palette order.
    pub fn reassign_symbols(&mut self) {
        if !self.active.is_empty() {
            self.active.assign_symbols_sequential();
            self.notify(ChangeEvent::PaletteEdited);
        }
    }

    // ---- export ------------------------------------------------------------

    /// Build the finalized stitch grid for the export collaborator.
    pub fn pattern(&self) -> Result<Pattern, EditError> {
        Pattern::from_canvas(&self.canvas, &self.active)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn project() -> Project {
        Project::new_untitled(1, EditorConfig::default()).unwrap()
    }

    fn red() -> ThreadColor {
        ThreadColor::new("red", "Red", [255, 0, 0])
    }

    #[test]
    fn undo_on_fresh_project_is_a_quiet_noop() {
        let mut p = project();
        assert_eq!(p.undo(), None);
        assert_eq!(p.redo(), None);
        assert!(!p.is_dirty);
    }

    #[test]
    fn committed_stroke_marks_dirty_and_fires_listener_once() {
        let mut p = project();
        let fired = Rc::new(RefCell::new(0usize));
        let fired_in = Rc::clone(&fired);
        p.set_change_listener(Box::new(move |_| *fired_in.borrow_mut() += 1));

        p.begin_stroke().unwrap();
        p.paint(0, 0, [255, 0, 0]).unwrap();
        assert!(p.commit_stroke());

        assert!(p.is_dirty);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn empty_stroke_commits_without_notification() {
        let mut p = project();
        let fired = Rc::new(RefCell::new(0usize));
        let fired_in = Rc::clone(&fired);
        p.set_change_listener(Box::new(move |_| *fired_in.borrow_mut() += 1));

        p.begin_stroke().unwrap();
        assert!(!p.commit_stroke());
        assert_eq!(*fired.borrow(), 0);
        assert!(!p.is_dirty);
    }

    #[test]
    fn setting_a_listener_replaces_the_previous_one() {
        // Re-registering must not stack callbacks: one commit, one fire.
        let mut p = project();
        let fired = Rc::new(RefCell::new(0usize));
        for _ in 0..3 {
            let fired_in = Rc::clone(&fired);
            p.set_change_listener(Box::new(move |_| *fired_in.borrow_mut() += 1));
        }

        p.begin_stroke().unwrap();
        p.paint(1, 1, [0, 0, 0]).unwrap();
        p.commit_stroke();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn usage_counts_refresh_on_commit() {
        let mut p = project();
        p.add_active_color(&red());

        p.begin_stroke().unwrap();
        p.paint(0, 0, [250, 10, 10]).unwrap();
        p.paint(1, 0, [255, 0, 0]).unwrap();
        p.commit_stroke();

        assert_eq!(p.active_palette().entries()[0].count, 2);

        p.undo();
        assert_eq!(p.active_palette().entries()[0].count, 0);
    }

    #[test]
    fn resize_clears_history() {
        let mut p = project();
        p.begin_stroke().unwrap();
        p.paint(0, 0, [1, 2, 3]).unwrap();
        p.commit_stroke();
        assert!(p.can_undo());

        p.resize_canvas(32, 32, Anchor::TopLeft).unwrap();
        assert!(!p.can_undo());
        assert!(!p.can_redo());
        assert_eq!(p.canvas().width(), 32);
    }

    #[test]
    fn resize_rejects_out_of_range_sizes_untouched() {
        let mut p = project();
        let before_w = p.canvas().width();
        assert!(p.resize_canvas(0, 10, Anchor::Center).is_err());
        assert!(p.resize_canvas(10, 9999, Anchor::Center).is_err());
        assert_eq!(p.canvas().width(), before_w);
    }

    #[test]
    fn new_canvas_starts_clean() {
        let mut p = project();
        p.begin_stroke().unwrap();
        p.paint(0, 0, [1, 2, 3]).unwrap();
        p.commit_stroke();
        assert!(p.is_dirty);

        p.new_canvas(16, 16).unwrap();
        assert!(!p.is_dirty);
        assert!(!p.can_undo());
        assert_eq!(p.canvas().opaque_count(), 0);
        assert_eq!(p.display_title(), "Untitled-1");
    }

    #[test]
    fn stroke_protocol_is_enforced() {
        let mut p = project();
        assert!(p.paint(0, 0, [1, 1, 1]).is_err()); // no stroke open
        p.begin_stroke().unwrap();
        assert!(p.begin_stroke().is_err()); // already recording
    }
}
