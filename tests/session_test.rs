//! End-to-end session flow: paint → palette build → merge → reduce →
//! pattern export → snapshot round trip, all through the public API.

use stitchfe::canvas::{Anchor, opaque};
use stitchfe::config::EditorConfig;
use stitchfe::error::{EditError, NoOpReason};
use stitchfe::io::{build_sfe_v1, decode_sfe, encode_sfe, restore_sfe_v1};
use stitchfe::ops::palette_ops::CandidateSource;
use stitchfe::palette::{ThreadColor, parse_catalog};
use stitchfe::project::Project;

fn catalog() -> Vec<ThreadColor> {
    parse_catalog(
        "code,name,r,g,b\n\
         310,Black,0,0,0\n\
         666,Bright Red,227,29,66\n\
         797,Royal Blue,19,71,125\n\
         702,Kelly Green,71,167,47\n\
         B5200,Snow White,255,255,255",
    )
}

#[test]
fn full_session_flow() {
    let catalog = catalog();
    let mut project = Project::with_canvas("wip", 8, 8, EditorConfig::default()).unwrap();

    // Paint a small motif: a red block with a blue corner.
    project.begin_stroke().unwrap();
    for y in 0..4 {
        for x in 0..4 {
            project.paint(x, y, [230, 30, 60]).unwrap();
        }
    }
    assert!(project.commit_stroke());

    project.begin_stroke().unwrap();
    project.paint(7, 7, [20, 70, 120]).unwrap();
    project.commit_stroke();

    assert_eq!(project.canvas().opaque_count(), 17);
    assert_eq!(project.undo_history().len(), 2);

    // Build the working palette from canvas content: red dominates.
    let len = project.build_active_from_canvas(2, &catalog).unwrap();
    assert_eq!(len, 2);
    assert_eq!(project.active_palette().entries()[0].code, "666");
    assert_eq!(project.active_palette().entries()[1].code, "797");

    // Reduce to a single colour: every opaque cell becomes exact 666 red.
    let outcome = project
        .reduce_colors(1, &catalog, CandidateSource::CanvasFrequency)
        .unwrap();
    assert_eq!(outcome.palette_len, 1);
    assert_eq!(project.canvas().get(7, 7), Some(opaque([227, 29, 66])));
    assert_eq!(project.canvas().get(0, 0), Some(opaque([227, 29, 66])));

    // The reduce was exactly one undo step.
    let label = project.undo().unwrap();
    assert!(label.contains("Reduce"));
    assert_eq!(project.canvas().get(7, 7), Some(opaque([20, 70, 120])));
    project.redo().unwrap();
    assert_eq!(project.canvas().get(7, 7), Some(opaque([227, 29, 66])));

    // Pattern projection: one stitch per opaque cell, legend covers the set.
    let pattern = project.pattern().unwrap();
    assert_eq!(pattern.stitch_count(), 17);
    assert!(pattern.stitches.iter().all(|s| s.code == "666"));
    assert_eq!(pattern.symbol_map.len(), 1);
}

#[test]
fn merge_is_one_undo_step_and_removes_the_dropped_color() {
    let catalog = catalog();
    let mut project = Project::with_canvas("merge", 4, 4, EditorConfig::default()).unwrap();

    project.begin_stroke().unwrap();
    project.paint(0, 0, [227, 29, 66]).unwrap();
    project.paint(1, 0, [19, 71, 125]).unwrap();
    project.commit_stroke();

    project.add_active_color(catalog.iter().find(|c| c.code == "666").unwrap());
    project.add_active_color(catalog.iter().find(|c| c.code == "797").unwrap());

    let outcome = project.merge_colors("666", "797").unwrap();
    assert_eq!(outcome.reassigned, 1);
    assert_eq!(project.canvas().get(1, 0), Some(opaque([227, 29, 66])));
    assert!(project.active_palette().find("797").is_none());

    // Undoing the merge restores the pixel (the palette removal itself is
    // not part of pixel history).
    project.undo().unwrap();
    assert_eq!(project.canvas().get(1, 0), Some(opaque([19, 71, 125])));
    project.redo().unwrap();
    assert_eq!(project.canvas().get(1, 0), Some(opaque([227, 29, 66])));

    // With only red cells left, merging into a colour nothing classifies to
    // reports a no-op and changes nothing.
    project.add_active_color(catalog.iter().find(|c| c.code == "702").unwrap());
    let err = project.merge_colors("666", "702").unwrap_err();
    assert!(matches!(err, EditError::NoOp(NoOpReason::NothingToMerge)));
    assert!(project.active_palette().find("702").is_some());
}

#[test]
fn locked_colors_survive_rebuild_and_snapshot() {
    let catalog = catalog();
    let mut project = Project::with_canvas("locked", 4, 4, EditorConfig::default()).unwrap();

    // Canvas content is all white.
    project.begin_stroke().unwrap();
    for x in 0..4 {
        project.paint(x, 0, [255, 255, 255]).unwrap();
    }
    project.commit_stroke();

    // Lock a colour the canvas never uses.
    project.add_active_color(catalog.iter().find(|c| c.code == "702").unwrap());
    project.set_color_locked("702", true);

    // Rebuild with n = 1: the locked entry alone fills the effective bound
    // (max of n and the locked count), so frequency never evicts it.
    project.build_active_from_canvas(1, &catalog).unwrap();
    assert_eq!(project.active_palette().len(), 1);
    assert_eq!(project.active_palette().entries()[0].code, "702");

    // With room for two, the frequency winner (white) joins the locked one.
    project.build_active_from_canvas(2, &catalog).unwrap();
    let codes: Vec<&str> = project
        .active_palette()
        .entries()
        .iter()
        .map(|e| e.code.as_str())
        .collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&"702"));
    assert!(codes.contains(&"B5200"));

    // Snapshot round trip keeps the lock.
    let bytes = encode_sfe(&build_sfe_v1(&project).unwrap()).unwrap();
    let restored = restore_sfe_v1(
        &decode_sfe(&bytes).unwrap(),
        "restored",
        &catalog,
        EditorConfig::default(),
    )
    .unwrap();
    assert!(restored.active_palette().find("702").unwrap().locked);
}

#[test]
fn anchored_resize_preserves_content_and_resets_history() {
    let mut project = Project::with_canvas("resize", 4, 4, EditorConfig::default()).unwrap();
    project.begin_stroke().unwrap();
    project.paint(3, 3, [10, 20, 30]).unwrap();
    project.commit_stroke();

    project.resize_canvas(6, 6, Anchor::BottomRight).unwrap();
    assert_eq!(project.canvas().get(5, 5), Some(opaque([10, 20, 30])));
    assert!(!project.can_undo());

    // Painting keeps working in the new coordinate space.
    project.begin_stroke().unwrap();
    project.paint(0, 0, [1, 1, 1]).unwrap();
    assert!(project.commit_stroke());
    assert_eq!(project.canvas().opaque_count(), 2);
}
