//! Editor configuration.
//!
//! A plain immutable value handed to [`crate::project::Project`] at
//! construction. There is deliberately no global settings object: every
//! session carries its own copy, and persistence of user preferences is a
//! host-application concern.

/// Limits and defaults for one editing session.
#[derive(Debug, Clone, Copy)]
pub struct EditorConfig {
    /// Canvas dimensions used by `Project::new_untitled`.
    pub default_canvas_width: u32,
    pub default_canvas_height: u32,
    /// Hard per-axis cap for create and resize (cells).
    pub max_canvas_dim: u32,
    /// Undo history depth; the oldest action is pruned beyond this.
    pub max_history_depth: usize,
    /// Reference-layer display defaults carried into new projects.
    pub reference_opacity: f32,
    pub reference_visible: bool,
    pub pixel_layer_opacity: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_canvas_width: 64,
            default_canvas_height: 64,
            max_canvas_dim: 4096,
            max_history_depth: 50,
            reference_opacity: 0.6,
            reference_visible: true,
            pixel_layer_opacity: 1.0,
        }
    }
}
