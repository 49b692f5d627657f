// ============================================================================
// QUANTIZE OPS — whole-buffer recolors, each landing as one undo step
// ============================================================================
//
// Every bulk edit here follows the same shape: compute the complete
// replacement buffer first, diff it against the canvas in a single pass,
// and hand the diff to the history manager as one action. There is no code
// path that writes a partial result.

use image::{Rgba, RgbaImage, imageops};
use rayon::prelude::*;

use crate::canvas::{CanvasState, TRANSPARENT, is_opaque, opaque};
use crate::components::history::{HistoryManager, PixelChange, StrokeAction};
use crate::error::EditError;
use crate::palette::{ActivePalette, ThreadColor, nearest_index};

/// Diff `replacement` against the canvas and apply the differences as one
/// undoable action. Returns the number of cells changed (0 = no action
/// pushed). The replacement must match the canvas dimensions.
pub fn apply_pixels_with_undo(
    canvas: &mut CanvasState,
    history: &mut HistoryManager,
    replacement: &RgbaImage,
    label: &str,
) -> Result<usize, EditError> {
    if replacement.width() != canvas.width() || replacement.height() != canvas.height() {
        return Err(EditError::Validation(format!(
            "replacement buffer is {}×{}, canvas is {}×{}",
            replacement.width(),
            replacement.height(),
            canvas.width(),
            canvas.height()
        )));
    }

    let changes: Vec<PixelChange> = canvas
        .cells()
        .filter_map(|(x, y, old)| {
            let new = *replacement.get_pixel(x, y);
            (old != new).then_some(PixelChange { x, y, old, new })
        })
        .collect();

    Ok(history.apply_bulk(canvas, StrokeAction::with_changes(label, changes)))
}

/// Clear every opaque cell, undoable as a single step.
pub fn clear_with_undo(canvas: &mut CanvasState, history: &mut HistoryManager) -> usize {
    let changes: Vec<PixelChange> = canvas
        .cells()
        .filter(|(_, _, px)| is_opaque(*px))
        .map(|(x, y, old)| PixelChange {
            x,
            y,
            old,
            new: TRANSPARENT,
        })
        .collect();

    history.apply_bulk(canvas, StrokeAction::with_changes("Clear Canvas", changes))
}

/// Import an already-decoded RGBA image onto the canvas, quantized to the
/// master catalog, as one undo step.
///
/// The source is scaled to the canvas size with nearest-neighbour sampling
/// (no interpolation — imported pixel art stays crisp), then every opaque
/// pixel is replaced by its nearest catalog color.
pub fn import_quantized(
    canvas: &mut CanvasState,
    history: &mut HistoryManager,
    source: &RgbaImage,
    catalog: &[ThreadColor],
) -> Result<usize, EditError> {
    if catalog.is_empty() {
        return Err(EditError::Validation("the master catalog is empty".into()));
    }
    if source.width() == 0 || source.height() == 0 {
        return Err(EditError::Validation("source image is empty".into()));
    }

    let w = canvas.width();
    let h = canvas.height();
    let scaled;
    let src = if source.width() == w && source.height() == h {
        source
    } else {
        scaled = imageops::resize(source, w, h, imageops::FilterType::Nearest);
        &scaled
    };

    let replacement = map_pixels_parallel(src, |px| {
        if px[3] == 0 {
            TRANSPARENT
        } else {
            // Catalog is non-empty, so nearest_index always resolves.
            let idx = nearest_index([px[0], px[1], px[2]], catalog).unwrap();
            opaque(catalog[idx].rgb)
        }
    });

    apply_pixels_with_undo(canvas, history, &replacement, "Import Image")
}

/// Recompute the derived usage count of every active entry by classifying
/// all opaque cells against the active set.
pub fn update_usage_counts(canvas: &CanvasState, active: &mut ActivePalette) {
    active.reset_counts();
    if active.is_empty() {
        return;
    }
    let counts = tally_usage(canvas, active.entries());
    for (entry, count) in active.entries_mut().iter_mut().zip(counts) {
        entry.count = count;
    }
}

/// Per-entry opaque-cell tally against an arbitrary palette. Row-parallel;
/// classification itself stays deterministic.
pub fn tally_usage(canvas: &CanvasState, palette: &[ThreadColor]) -> Vec<usize> {
    if palette.is_empty() {
        return Vec::new();
    }
    let img = canvas.to_rgba_image();
    let w = img.width();

    (0..img.height())
        .into_par_iter()
        .map(|y| {
            let mut row_counts = vec![0usize; palette.len()];
            for x in 0..w {
                let px = img.get_pixel(x, y);
                if px[3] == 0 {
                    continue;
                }
                if let Some(idx) = nearest_index([px[0], px[1], px[2]], palette) {
                    row_counts[idx] += 1;
                }
            }
            row_counts
        })
        .reduce(
            || vec![0usize; palette.len()],
            |mut acc, row| {
                for (a, r) in acc.iter_mut().zip(row) {
                    *a += r;
                }
                acc
            },
        )
}

/// Catalog indices ranked by canvas usage, most frequent first. Ties break
/// toward the earlier catalog position so the ranking is deterministic.
/// Entries with zero usage are omitted.
pub fn rank_by_usage(canvas: &CanvasState, catalog: &[ThreadColor]) -> Vec<usize> {
    let counts = tally_usage(canvas, catalog);
    let mut ranked: Vec<(usize, usize)> = counts
        .into_iter()
        .enumerate()
        .filter(|&(_, count)| count > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(idx, _)| idx).collect()
}

/// Build a full replacement buffer by mapping every source pixel, rows in
/// parallel.
pub(crate) fn map_pixels_parallel<F>(src: &RgbaImage, f: F) -> RgbaImage
where
    F: Fn(Rgba<u8>) -> Rgba<u8> + Sync,
{
    let w = src.width();
    let h = src.height();
    let rows: Vec<Vec<u8>> = (0..h)
        .into_par_iter()
        .map(|y| {
            let mut row = Vec::with_capacity(w as usize * 4);
            for x in 0..w {
                row.extend_from_slice(&f(*src.get_pixel(x, y)).0);
            }
            row
        })
        .collect();
    // Exactly w*h*4 bytes by construction.
    RgbaImage::from_raw(w, h, rows.concat()).unwrap()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::ThreadColor;

    fn entry(code: &str, rgb: [u8; 3]) -> ThreadColor {
        ThreadColor::new(code, code, rgb)
    }

    fn setup() -> (CanvasState, HistoryManager) {
        (CanvasState::new(4, 4, 4096).unwrap(), HistoryManager::new(50))
    }

    #[test]
    fn bulk_recolor_is_one_undo_step() {
        let (mut canvas, mut history) = setup();
        let mut replacement = canvas.to_rgba_image();
        for x in 0..4 {
            replacement.put_pixel(x, 0, opaque([1, 2, 3]));
        }

        let changed =
            apply_pixels_with_undo(&mut canvas, &mut history, &replacement, "Fill Row").unwrap();
        assert_eq!(changed, 4);
        assert_eq!(history.undo_count(), 1);

        assert_eq!(history.undo(&mut canvas).as_deref(), Some("Fill Row"));
        assert_eq!(canvas.opaque_count(), 0);
    }

    #[test]
    fn identical_replacement_pushes_nothing() {
        let (mut canvas, mut history) = setup();
        let replacement = canvas.to_rgba_image();
        let changed =
            apply_pixels_with_undo(&mut canvas, &mut history, &replacement, "Nothing").unwrap();
        assert_eq!(changed, 0);
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn mismatched_replacement_dimensions_are_rejected() {
        let (mut canvas, mut history) = setup();
        let wrong = RgbaImage::new(2, 2);
        assert!(apply_pixels_with_undo(&mut canvas, &mut history, &wrong, "Bad").is_err());
    }

    #[test]
    fn clear_with_undo_restores_on_undo() {
        let (mut canvas, mut history) = setup();
        canvas.set(1, 1, opaque([7, 7, 7]));
        canvas.set(2, 2, opaque([8, 8, 8]));

        assert_eq!(clear_with_undo(&mut canvas, &mut history), 2);
        assert_eq!(canvas.opaque_count(), 0);

        history.undo(&mut canvas);
        assert_eq!(canvas.get(1, 1), Some(opaque([7, 7, 7])));
        assert_eq!(canvas.get(2, 2), Some(opaque([8, 8, 8])));
    }

    #[test]
    fn import_quantizes_to_exact_catalog_colors() {
        let (mut canvas, mut history) = setup();
        let catalog = vec![entry("red", [255, 0, 0]), entry("blue", [0, 0, 255])];

        let mut src = RgbaImage::new(4, 4);
        src.put_pixel(0, 0, Rgba([250, 5, 5, 255])); // near red
        src.put_pixel(1, 0, Rgba([5, 5, 250, 255])); // near blue
        // everything else transparent

        let changed = import_quantized(&mut canvas, &mut history, &src, &catalog).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(canvas.get(0, 0), Some(opaque([255, 0, 0])));
        assert_eq!(canvas.get(1, 0), Some(opaque([0, 0, 255])));
        assert_eq!(history.undo_count(), 1); // single undo step
    }

    #[test]
    fn import_scales_with_nearest_neighbour() {
        let mut canvas = CanvasState::new(2, 2, 4096).unwrap();
        let mut history = HistoryManager::new(50);
        let catalog = vec![entry("red", [255, 0, 0]), entry("blue", [0, 0, 255])];

        // 4×4 source: left half red, right half blue → 2×2 result keeps halves.
        let mut src = RgbaImage::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                let c = if x < 2 { [255, 0, 0, 255] } else { [0, 0, 255, 255] };
                src.put_pixel(x, y, Rgba(c));
            }
        }

        import_quantized(&mut canvas, &mut history, &src, &catalog).unwrap();
        assert_eq!(canvas.get(0, 0), Some(opaque([255, 0, 0])));
        assert_eq!(canvas.get(1, 0), Some(opaque([0, 0, 255])));
    }

    #[test]
    fn usage_counts_ignore_transparent_cells() {
        let (mut canvas, _) = setup();
        canvas.set(0, 0, opaque([250, 0, 0]));
        canvas.set(1, 0, opaque([255, 10, 10]));
        canvas.set(3, 3, opaque([0, 0, 240]));

        let mut active = ActivePalette::default();
        active.add_clone(&entry("red", [255, 0, 0]));
        active.add_clone(&entry("blue", [0, 0, 255]));

        update_usage_counts(&canvas, &mut active);
        assert_eq!(active.entries()[0].count, 2);
        assert_eq!(active.entries()[1].count, 1);
    }

    #[test]
    fn ranking_orders_by_frequency_then_catalog_position() {
        let (mut canvas, _) = setup();
        let catalog = vec![
            entry("a", [255, 0, 0]),
            entry("b", [0, 255, 0]),
            entry("c", [0, 0, 255]),
        ];
        canvas.set(0, 0, opaque([0, 255, 0]));
        canvas.set(1, 0, opaque([0, 255, 0]));
        canvas.set(2, 0, opaque([255, 0, 0]));
        canvas.set(3, 0, opaque([0, 0, 255]));

        // b twice; a and c once each → a precedes c by catalog position.
        assert_eq!(rank_by_usage(&canvas, &catalog), vec![1, 0, 2]);
    }
}
