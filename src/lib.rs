//! StitchFE core — a palette-constrained raster editor for cross-stitch
//! pattern design.
//!
//! Every pixel on the canvas is meant to resolve to an entry of a finite
//! thread catalog. The crate provides the editing engine only: the pixel
//! buffer with stroke-coalesced undo/redo, nearest-colour classification,
//! active-palette construction/reduction/merging with locked entries, and
//! the stitch-grid projection consumed by pattern exporters. Windowing,
//! file dialogs and PDF typesetting live in collaborating crates.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod io;
pub mod ops;
pub mod palette;
pub mod pattern;
pub mod project;
