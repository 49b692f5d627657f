use std::collections::HashMap;

use crate::canvas::CanvasState;
use crate::error::{EditError, NoOpReason};
use crate::palette::{ActivePalette, ThreadColor, nearest_in_palette};

// ============================================================================
// PATTERN — the finalized stitch grid handed to exporters
// ============================================================================

/// One full cross stitch: a cell plus the thread it resolves to.
#[derive(Clone, Debug, PartialEq)]
pub struct Stitch {
    pub x: u32,
    pub y: u32,
    pub code: String,
    pub rgb: [u8; 3],
}

/// A finalized pattern: every opaque cell as a stitch, the palette snapshot
/// it was classified against, and the legend's code→symbol map.
///
/// This is an owned copy — later edits to the canvas or palette never show
/// through, and exporters must not assume live aliasing either.
#[derive(Clone, Default)]
pub struct Pattern {
    pub width: u32,
    pub height: u32,
    pub stitches: Vec<Stitch>,
    /// Active palette at build time.
    pub palette: Vec<ThreadColor>,
    /// Covers exactly the palette above; one unique symbol per code.
    pub symbol_map: HashMap<String, String>,
}

impl Pattern {
    /// Project the canvas onto the active palette. Transparent cells emit
    /// no stitch at all. Requires a non-empty active palette.
    pub fn from_canvas(canvas: &CanvasState, active: &ActivePalette) -> Result<Self, EditError> {
        if active.is_empty() {
            return Err(EditError::NoOp(NoOpReason::EmptyPalette));
        }

        let entries = active.entries();
        let mut stitches = Vec::new();
        for (x, y, px) in canvas.cells() {
            if px[3] == 0 {
                continue;
            }
            // Palette is non-empty, so a nearest entry always exists.
            let nearest = nearest_in_palette([px[0], px[1], px[2]], entries).unwrap();
            stitches.push(Stitch {
                x,
                y,
                code: nearest.code.clone(),
                rgb: nearest.rgb,
            });
        }

        let symbol_map = entries
            .iter()
            .map(|e| (e.code.clone(), e.symbol.clone().unwrap_or_default()))
            .collect();

        Ok(Self {
            width: canvas.width(),
            height: canvas.height(),
            stitches,
            palette: entries.to_vec(),
            symbol_map,
        })
    }

    pub fn stitch_count(&self) -> usize {
        self.stitches.len()
    }

    /// Legend symbol for a code, if the code is part of this pattern's
    /// palette.
    pub fn symbol_for(&self, code: &str) -> Option<&str> {
        self.symbol_map.get(code).map(String::as_str)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::opaque;

    fn entry(code: &str, rgb: [u8; 3]) -> ThreadColor {
        ThreadColor::new(code, code, rgb)
    }

    #[test]
    fn transparent_cells_emit_no_stitches() {
        let mut canvas = CanvasState::new(3, 3, 4096).unwrap();
        canvas.set(1, 1, opaque([250, 5, 5]));
        let mut active = ActivePalette::default();
        active.add_clone(&entry("red", [255, 0, 0]));

        let pattern = Pattern::from_canvas(&canvas, &active).unwrap();
        assert_eq!(pattern.stitch_count(), 1);
        let s = &pattern.stitches[0];
        assert_eq!((s.x, s.y), (1, 1));
        assert_eq!(s.code, "red");
        assert_eq!(s.rgb, [255, 0, 0]); // palette RGB, not the raw cell
    }

    #[test]
    fn symbol_map_covers_exactly_the_active_palette() {
        let canvas = CanvasState::new(2, 2, 4096).unwrap();
        let mut active = ActivePalette::default();
        active.add_clone(&entry("310", [0, 0, 0]));
        active.add_clone(&entry("666", [227, 29, 66]));

        let pattern = Pattern::from_canvas(&canvas, &active).unwrap();
        assert_eq!(pattern.symbol_map.len(), 2);
        assert!(pattern.symbol_for("310").is_some());
        assert!(pattern.symbol_for("666").is_some());
        assert!(pattern.symbol_for("999").is_none());
        assert_ne!(pattern.symbol_for("310"), pattern.symbol_for("666"));
    }

    #[test]
    fn empty_active_palette_is_reported() {
        let canvas = CanvasState::new(2, 2, 4096).unwrap();
        let active = ActivePalette::default();
        assert!(matches!(
            Pattern::from_canvas(&canvas, &active),
            Err(EditError::NoOp(NoOpReason::EmptyPalette))
        ));
    }

    #[test]
    fn pattern_is_a_detached_snapshot() {
        let mut canvas = CanvasState::new(2, 2, 4096).unwrap();
        canvas.set(0, 0, opaque([0, 0, 0]));
        let mut active = ActivePalette::default();
        active.add_clone(&entry("310", [0, 0, 0]));

        let pattern = Pattern::from_canvas(&canvas, &active).unwrap();
        canvas.set(0, 0, opaque([255, 255, 255]));
        active.clear();

        assert_eq!(pattern.stitch_count(), 1);
        assert_eq!(pattern.palette.len(), 1);
    }
}
