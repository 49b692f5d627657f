// ============================================================================
// PALETTE OPS — build / reduce / merge the active working set
// ============================================================================
//
// One bounded-selection routine drives every size-limited operation. Locked
// entries are seeded first and can never be evicted: the effective target
// size is max(requested, locked). Candidates then fill the remaining slots
// in rank order, and a backfill pool covers the case where the canvas
// cannot supply enough distinct codes.

use crate::canvas::{CanvasState, TRANSPARENT, opaque};
use crate::components::history::HistoryManager;
use crate::error::{EditError, NoOpReason};
use crate::palette::{ActivePalette, ThreadColor, code_eq, nearest_index};

use super::quantize::{apply_pixels_with_undo, map_pixels_parallel, rank_by_usage};

/// Where `reduce_colors` takes its candidates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateSource {
    /// Rank the master catalog by opaque-cell frequency on the canvas.
    CanvasFrequency,
    /// Keep the current active palette's ordering, truncated.
    ActiveOrder,
}

#[derive(Debug, Clone, Copy)]
pub struct ReduceOutcome {
    pub palette_len: usize,
    pub cells_recolored: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct MergeOutcome {
    /// Opaque cells that classified to the dropped colour.
    pub reassigned: usize,
    /// Cells whose stored value actually changed (differs from
    /// `reassigned` only when two entries share an RGB).
    pub cells_recolored: usize,
}

// ----------------------------------------------------------------------------
// Bounded selection (shared by build and reduce)
// ----------------------------------------------------------------------------

/// Assemble a target set of at most `max(n, |seed|)` entries: seed first
/// (deduplicated by code), then candidates in order, then the backfill pool.
/// Never fabricates colours — may return fewer when the pools run dry.
fn select_bounded(
    n: usize,
    seed: Vec<ThreadColor>,
    candidates: impl IntoIterator<Item = ThreadColor>,
    backfill: &[ThreadColor],
) -> Vec<ThreadColor> {
    let mut result: Vec<ThreadColor> = Vec::new();
    for entry in seed {
        if !contains_code(&result, &entry.code) {
            result.push(entry);
        }
    }

    let n_eff = n.max(result.len());

    for entry in candidates {
        if result.len() >= n_eff {
            break;
        }
        if !contains_code(&result, &entry.code) {
            result.push(entry);
        }
    }
    for entry in backfill {
        if result.len() >= n_eff {
            break;
        }
        if !contains_code(&result, &entry.code) {
            result.push(entry.clone());
        }
    }

    result
}

fn contains_code(entries: &[ThreadColor], code: &str) -> bool {
    entries.iter().any(|e| code_eq(&e.code, code))
}

/// Ranked catalog candidates for a frequency-based selection. The ranked
/// list is overshot (3× the target) so codes already seeded by locked
/// entries do not eat into the fill.
fn frequency_candidates(
    canvas: &CanvasState,
    catalog: &[ThreadColor],
    n_eff: usize,
) -> Vec<ThreadColor> {
    rank_by_usage(canvas, catalog)
        .into_iter()
        .take(n_eff.saturating_mul(3))
        .map(|idx| catalog[idx].clone())
        .collect()
}

// ----------------------------------------------------------------------------
// Build / reduce / merge
// ----------------------------------------------------------------------------

/// Rebuild the active palette from canvas content: the `n` most-used
/// catalog colours, with locked entries of the current set preserved on
/// top of that bound. Does not recolour the canvas.
pub fn build_from_canvas(
    canvas: &CanvasState,
    catalog: &[ThreadColor],
    active: &mut ActivePalette,
    n: usize,
) -> Result<usize, EditError> {
    if n < 1 {
        return Err(EditError::Validation("max colours must be at least 1".into()));
    }

    let seed = active.locked_entries();
    let n_eff = n.max(seed.len());
    let candidates = frequency_candidates(canvas, catalog, n_eff);
    let selected = select_bounded(n, seed, candidates, catalog);

    active.replace(selected);
    Ok(active.len())
}

/// Shrink the working set to `n` colours (locked entries always kept) and
/// recolour every opaque cell to its nearest entry of the result, as one
/// undo step. The target set replaces the active palette.
pub fn reduce_colors(
    canvas: &mut CanvasState,
    history: &mut HistoryManager,
    catalog: &[ThreadColor],
    active: &mut ActivePalette,
    n: usize,
    source: CandidateSource,
) -> Result<ReduceOutcome, EditError> {
    if n < 1 {
        return Err(EditError::Validation("max colours must be at least 1".into()));
    }

    let seed = active.locked_entries();
    let n_eff = n.max(seed.len());

    // An empty active set cannot drive an order-based reduction; fall back
    // to the canvas-frequency ranking.
    let use_active_order = source == CandidateSource::ActiveOrder && !active.is_empty();

    let target = if use_active_order {
        // Backfill pool is the active set itself: reducing never introduces
        // colours that are not already in use.
        let candidates: Vec<ThreadColor> = active.entries().to_vec();
        select_bounded(n, seed, candidates, active.entries())
    } else {
        let candidates = frequency_candidates(canvas, catalog, n_eff);
        select_bounded(n, seed, candidates, catalog)
    };

    if target.is_empty() {
        return Err(EditError::NoOp(NoOpReason::EmptySelection));
    }

    let replacement = map_pixels_parallel(&canvas.to_rgba_image(), |px| {
        if px[3] == 0 {
            TRANSPARENT
        } else {
            let idx = nearest_index([px[0], px[1], px[2]], &target).unwrap();
            opaque(target[idx].rgb)
        }
    });

    let label = format!("Reduce to {} colours", target.len());
    let cells_recolored = apply_pixels_with_undo(canvas, history, &replacement, &label)?;

    active.replace(target);
    Ok(ReduceOutcome {
        palette_len: active.len(),
        cells_recolored,
    })
}

/// Merge `drop_code` into `keep_code`: every opaque cell whose nearest
/// match against the *current* active set is the dropped entry is recoloured
/// to the kept entry's exact RGB (one undo step), then the dropped entry
/// leaves the palette.
///
/// Reports `NoOp` — with canvas and palette untouched — when no cell
/// classifies to the dropped colour.
pub fn merge_colors(
    canvas: &mut CanvasState,
    history: &mut HistoryManager,
    active: &mut ActivePalette,
    keep_code: &str,
    drop_code: &str,
) -> Result<MergeOutcome, EditError> {
    if active.is_empty() {
        return Err(EditError::NoOp(NoOpReason::EmptyPalette));
    }
    if code_eq(keep_code, drop_code) {
        return Err(EditError::Validation(
            "merge requires two different colours".into(),
        ));
    }
    let keep = active
        .find(keep_code)
        .cloned()
        .ok_or_else(|| EditError::Validation(format!("'{}' is not in the active palette", keep_code)))?;
    let drop_idx = active
        .entries()
        .iter()
        .position(|e| code_eq(&e.code, drop_code))
        .ok_or_else(|| EditError::Validation(format!("'{}' is not in the active palette", drop_code)))?;

    // Classify against the current set, before any removal.
    let classify: Vec<ThreadColor> = active.entries().to_vec();
    let img = canvas.to_rgba_image();

    let mut reassigned = 0usize;
    let mut replacement = img.clone();
    for (x, y, px) in img.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        if nearest_index([px[0], px[1], px[2]], &classify) == Some(drop_idx) {
            reassigned += 1;
            replacement.put_pixel(x, y, opaque(keep.rgb));
        }
    }

    if reassigned == 0 {
        return Err(EditError::NoOp(NoOpReason::NothingToMerge));
    }

    let drop_code_owned = classify[drop_idx].code.clone();
    let label = format!("Merge {} into {}", drop_code_owned, keep.code);
    let cells_recolored = apply_pixels_with_undo(canvas, history, &replacement, &label)?;

    active.remove(&drop_code_owned);
    Ok(MergeOutcome {
        reassigned,
        cells_recolored,
    })
}

// ============================================================================
// TESTS
// ============================================================================
