//! Shrink an image to fit a size/width preset.

use std::num::NonZeroU32;

use anyhow::Result;
use clap::Parser;
use nanobanana::cli::OptimizeOptions;
use nanobanana::config::setup_logging;
use nanobanana::optimize::backend::BackendKind;
use nanobanana::optimize::{SizeConstraint, default_output_path, optimize_file};

fn main() -> Result<()> {
    let opts = OptimizeOptions::parse();
    let _ = setup_logging(opts.debug);

    let constraint = SizeConstraint::resolve(
        opts.preset,
        opts.max_size,
        opts.width.map(NonZeroU32::get),
    );
    let dst = opts
        .out
        .clone()
        .unwrap_or_else(|| default_output_path(&opts.image));
    let backend = opts.backend.unwrap_or_else(BackendKind::detect).backend();

    let report = optimize_file(backend.as_ref(), &opts.image, &dst, constraint)?;

    println!("{report}");
    Ok(())
}
