// ============================================================================
// StitchFE CLI — headless batch pattern generation
// ============================================================================
//
// Usage examples:
//   stitchfe -i photo.png --catalog dmc.csv -o pattern.png
//   stitchfe -i photo.jpg --catalog dmc.csv --colors 20 --grid-width 80
//   stitchfe -i shots/*.jpg --catalog dmc.csv --output-dir patterns/
//
// Each input image is quantized onto a stitch grid against the thread
// catalog, the working palette is built from canvas content and reduced to
// the requested colour count, and two artifacts are written: the quantized
// grid as a PNG and the stitch list as a CSV (cell, code, symbol, RGB).
// All processing runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::config::EditorConfig;
use crate::io::load_catalog;
use crate::ops::palette_ops::CandidateSource;
use crate::palette::ThreadColor;
use crate::project::Project;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// StitchFE headless pattern generator.
///
/// Quantize images against a thread catalog and emit stitch grids — no GUI
/// required.
#[derive(Parser, Debug)]
#[command(
    name = "stitchfe",
    about = "StitchFE headless batch pattern generator",
    long_about = "Quantize images onto a cross-stitch grid against a thread catalog\n\
                  and write the resulting pattern artifacts without opening a GUI.\n\n\
                  Example:\n  \
                  stitchfe --input photo.png --catalog dmc.csv --colors 20 --output pattern.png\n  \
                  stitchfe -i shots/*.jpg --catalog dmc.csv --output-dir patterns/"
)]
pub struct CliArgs {
    /// Input image file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Thread catalog CSV: `code,name,R,G,B` with a header row.
    #[arg(short, long, value_name = "CSV")]
    pub catalog: PathBuf,

    /// Maximum number of colours in the final palette (locked entries
    /// aside, the working set is reduced to this).
    #[arg(long, default_value_t = 30, value_name = "N")]
    pub colors: usize,

    /// Stitch-grid width in cells. Defaults to the image's pixel width.
    #[arg(long, value_name = "CELLS")]
    pub grid_width: Option<u32>,

    /// Stitch-grid height in cells. Defaults to keeping the image's aspect
    /// ratio (or the pixel height when --grid-width is also omitted).
    #[arg(long, value_name = "CELLS")]
    pub grid_height: Option<u32>,

    /// Output PNG path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Skip the stitch-list CSV and write only the quantized PNG.
    #[arg(long)]
    pub no_stitch_list: bool,

    /// Print per-file palette and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let catalog = match load_catalog(&args.catalog) {
        Ok(c) if !c.is_empty() => c,
        Ok(_) => {
            eprintln!(
                "error: catalog '{}' contains no usable rows.",
                args.catalog.display()
            );
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!(
                "error: could not read catalog '{}': {}",
                args.catalog.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, &catalog, &args) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    catalog: &[ThreadColor],
    args: &CliArgs,
) -> Result<(), String> {
    // -- Step 1: Decode ---------------------------------------------------
    // The CLI plays the "decoding collaborator" role: the engine itself
    // only ever sees RGBA data.
    let src = image::open(input)
        .map_err(|e| format!("load failed: {}", e))?
        .into_rgba8();

    let config = EditorConfig::default();
    let (grid_w, grid_h) = grid_size(&src, args.grid_width, args.grid_height, config.max_canvas_dim);

    // -- Step 2: Quantize onto the grid -----------------------------------
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "pattern".to_string());
    let mut project = Project::with_canvas(stem, grid_w, grid_h, config)
        .map_err(|e| format!("canvas setup failed: {}", e))?;

    project
        .import_image(&src, catalog)
        .map_err(|e| format!("import failed: {}", e))?;

    // -- Step 3: Build + reduce the working palette -----------------------
    project
        .build_active_from_canvas(args.colors, catalog)
        .map_err(|e| format!("palette build failed: {}", e))?;
    let outcome = project
        .reduce_colors(args.colors, catalog, CandidateSource::CanvasFrequency)
        .map_err(|e| format!("reduce failed: {}", e))?;

    if args.verbose {
        println!(
            "  {} cells on a {}×{} grid, {} colours",
            project.canvas().opaque_count(),
            grid_w,
            grid_h,
            outcome.palette_len
        );
        for entry in project.active_palette().entries() {
            println!(
                "    {} {} — {} ({} cells)",
                entry.symbol.as_deref().unwrap_or("?"),
                entry.code,
                entry.name,
                entry.count
            );
        }
    }

    // -- Step 4: Write artifacts ------------------------------------------
    project
        .canvas()
        .to_rgba_image()
        .save(output)
        .map_err(|e| format!("save failed: {}", e))?;

    if !args.no_stitch_list {
        let pattern = project
            .pattern()
            .map_err(|e| format!("pattern build failed: {}", e))?;
        let csv_path = output.with_extension("csv");
        std::fs::write(&csv_path, stitch_list_csv(&pattern))
            .map_err(|e| format!("stitch list write failed: {}", e))?;
    }

    Ok(())
}

/// Resolve the stitch-grid size from the CLI options, defaulting to the
/// source pixel dimensions and preserving aspect ratio when only one axis
/// is given. Clamped to the engine's canvas bound.
fn grid_size(
    src: &image::RgbaImage,
    grid_w: Option<u32>,
    grid_h: Option<u32>,
    max_dim: u32,
) -> (u32, u32) {
    let (sw, sh) = (src.width().max(1), src.height().max(1));
    let (w, h) = match (grid_w, grid_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, ((w as u64 * sh as u64) / sw as u64) as u32),
        (None, Some(h)) => (((h as u64 * sw as u64) / sh as u64) as u32, h),
        (None, None) => (sw, sh),
    };
    (w.clamp(1, max_dim), h.clamp(1, max_dim))
}

/// Render a pattern as `x,y,code,symbol,r,g,b` CSV rows.
fn stitch_list_csv(pattern: &crate::pattern::Pattern) -> String {
    let mut out = String::from("x,y,code,symbol,r,g,b\n");
    for s in &pattern.stitches {
        let symbol = pattern.symbol_for(&s.code).unwrap_or("");
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            s.x, s.y, s.code, symbol, s.rgb[0], s.rgb[1], s.rgb[2]
        ));
    }
    out
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            // Literal path — use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        // Treat as glob pattern
        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output PNG path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, `.png` extension
///    (appends `_pattern` to the stem if it would collide with the input)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.png", stem));

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_pattern.png", stem)))
    } else {
        Some(candidate)
    }
}

// ============================================================================
// TESTS
// ============================================================================
