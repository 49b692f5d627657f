// Headless binary: StitchFE ships its editing engine as a library plus this
// batch front-end. Interactive canvas windows live in a separate GUI crate
// that links against `stitchfe`.

use std::process::ExitCode;

use clap::Parser;

use stitchfe::cli;
use stitchfe::logger;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    cli::run(args)
}
