//! Size-fitting for images: presets, constraints and the shrink loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::constants::{MAX_SHRINK_ATTEMPTS, MIN_SHRINK_WIDTH};
use crate::error::NanoBananaError;

pub mod backend;

use backend::ResizeBackend;

/// Named size/width targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// 500KB, 1280px
    Github,
    /// 128KB, 800px
    Slack,
    /// 200KB, 1200px
    Web,
    /// 50KB, 400px
    Thumbnail,
}

impl Preset {
    /// The preset's limits.
    pub fn constraint(self) -> SizeConstraint {
        let (max_size_kb, max_width) = match self {
            Preset::Github => (500, 1280),
            Preset::Slack => (128, 800),
            Preset::Web => (200, 1200),
            Preset::Thumbnail => (50, 400),
        };
        SizeConstraint {
            max_size_kb: Some(max_size_kb),
            max_width: Some(max_width),
        }
    }
}

/// Limits the optimizer works towards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SizeConstraint {
    /// Byte budget in KB (1024 bytes)
    pub max_size_kb: Option<u64>,
    /// Width cap in pixels
    pub max_width: Option<u32>,
}

impl SizeConstraint {
    /// Preset first, then explicit flags override field by field. With
    /// nothing at all, the github preset applies.
    pub fn resolve(preset: Option<Preset>, max_size: Option<ByteSize>, width: Option<u32>) -> Self {
        let mut constraint = preset.map(Preset::constraint).unwrap_or_default();
        if let Some(max_size) = max_size {
            constraint.max_size_kb = Some(max_size.kilobytes());
        }
        if let Some(width) = width {
            constraint.max_width = Some(width);
        }
        if constraint == SizeConstraint::default() {
            constraint = Preset::Github.constraint();
        }
        constraint
    }

    /// Byte budget, if any.
    pub fn max_bytes(&self) -> Option<u64> {
        self.max_size_kb.map(|kb| kb * 1024)
    }
}

/// A byte count parsed from strings like `500KB`, `1.5MB`, `2048B` or `2048`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteSize(
    /// Byte count
    pub u64,
);

impl ByteSize {
    /// Whole kilobytes, rounded down.
    pub fn kilobytes(self) -> u64 {
        self.0 / 1024
    }
}

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        let (number, multiplier) = if let Some(number) = normalized.strip_suffix("KB") {
            (number, 1024.0)
        } else if let Some(number) = normalized.strip_suffix("MB") {
            (number, 1024.0 * 1024.0)
        } else if let Some(number) = normalized.strip_suffix('B') {
            (number, 1.0)
        } else {
            (normalized.as_str(), 1.0)
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("invalid size {raw:?}, expected something like 500KB or 1MB"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(format!("invalid size {raw:?}"));
        }
        Ok(ByteSize((value * multiplier) as u64))
    }
}

/// What the fit loop ended up with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FitOutcome {
    /// Where the result was written
    pub path: PathBuf,
    /// Number of resizes performed, including the initial width cap
    pub resizes: usize,
    /// Shrink steps taken while chasing the byte budget
    pub shrink_attempts: usize,
    /// Width of the result
    pub final_width: u32,
    /// Size of the result in bytes
    pub final_bytes: u64,
    /// False when a byte budget was set and not reached
    pub within_budget: bool,
}

fn working_path(dst: &Path) -> PathBuf {
    let ext = dst
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("png");
    dst.with_extension(format!("tmp.{ext}"))
}

fn file_size(path: &Path) -> Result<u64, NanoBananaError> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|err| NanoBananaError::io(path, err))
}

/// Copies `src` next to `dst`, shrinks it to fit `constraint` and moves the
/// result onto `dst`.
///
/// The byte budget is soft: after [`MAX_SHRINK_ATTEMPTS`] steps, or once the
/// next step would go below [`MIN_SHRINK_WIDTH`], whatever we have is kept.
pub fn fit_to_constraints(
    backend: &dyn ResizeBackend,
    src: &Path,
    dst: &Path,
    constraint: SizeConstraint,
) -> Result<FitOutcome, NanoBananaError> {
    if !src.is_file() {
        return Err(NanoBananaError::NotFound(src.to_path_buf()));
    }

    let working = working_path(dst);
    fs::copy(src, &working).map_err(|err| NanoBananaError::io(&working, err))?;

    match shrink(backend, &working, constraint) {
        Ok((resizes, shrink_attempts)) => {
            fs::rename(&working, dst).map_err(|err| NanoBananaError::io(dst, err))?;
            let (final_width, _) = backend.dimensions(dst)?;
            let final_bytes = file_size(dst)?;
            Ok(FitOutcome {
                path: dst.to_path_buf(),
                resizes,
                shrink_attempts,
                final_width,
                final_bytes,
                within_budget: constraint
                    .max_bytes()
                    .is_none_or(|budget| final_bytes <= budget),
            })
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&working) {
                debug!("Failed to remove {}: {}", working.display(), cleanup);
            }
            Err(err)
        }
    }
}

/// Returns (total resizes, shrink attempts).
fn shrink(
    backend: &dyn ResizeBackend,
    working: &Path,
    constraint: SizeConstraint,
) -> Result<(usize, usize), NanoBananaError> {
    let mut resizes = 0;

    if let Some(max_width) = constraint.max_width {
        let (width, _) = backend.dimensions(working)?;
        if width > max_width {
            debug!("Capping width {} -> {}", width, max_width);
            backend.resize_to_width(working, working, max_width)?;
            resizes += 1;
        }
    }

    let Some(budget) = constraint.max_bytes() else {
        return Ok((resizes, 0));
    };

    let mut attempts = 0;
    while attempts < MAX_SHRINK_ATTEMPTS {
        let size = file_size(working)?;
        if size <= budget {
            break;
        }
        let (width, _) = backend.dimensions(working)?;
        let next_width = u32::try_from(u64::from(width) * 4 / 5).unwrap_or(width);
        if next_width < MIN_SHRINK_WIDTH {
            debug!("Not shrinking below {}px", MIN_SHRINK_WIDTH);
            break;
        }
        debug!("{} bytes over budget {}, width {} -> {}", size, budget, width, next_width);
        backend.resize_to_width(working, working, next_width)?;
        resizes += 1;
        attempts += 1;
    }

    Ok((resizes, attempts))
}

/// `<stem>-optimized.<ext>` next to `src`.
pub fn default_output_path(src: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let name = match src.extension() {
        Some(ext) => format!("{stem}-optimized.{}", ext.to_string_lossy()),
        None => format!("{stem}-optimized"),
    };
    src.with_file_name(name)
}

/// Before/after summary for the CLI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Source size in bytes
    pub original_bytes: u64,
    /// Fit loop result
    pub outcome: FitOutcome,
}

impl OptimizeReport {
    /// Percentage saved, rounded to the nearest whole number.
    pub fn reduction_percent(&self) -> i64 {
        if self.original_bytes == 0 {
            return 0;
        }
        let saved = self.original_bytes as f64 - self.outcome.final_bytes as f64;
        (saved / self.original_bytes as f64 * 100.0).round() as i64
    }
}

impl std::fmt::Display for OptimizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Optimized: {}", self.outcome.path.display())?;
        write!(
            f,
            "Size: {}KB → {}KB ({}% reduction)",
            self.original_bytes / 1024,
            self.outcome.final_bytes / 1024,
            self.reduction_percent()
        )
    }
}

/// Runs the fit loop and measures the result.
pub fn optimize_file(
    backend: &dyn ResizeBackend,
    src: &Path,
    dst: &Path,
    constraint: SizeConstraint,
) -> Result<OptimizeReport, NanoBananaError> {
    if !src.is_file() {
        return Err(NanoBananaError::NotFound(src.to_path_buf()));
    }
    let original_bytes = file_size(src)?;
    info!(
        "Optimizing {} with {} backend (max {:?}KB, max width {:?})",
        src.display(),
        backend.name(),
        constraint.max_size_kb,
        constraint.max_width
    );

    let outcome = fit_to_constraints(backend, src, dst, constraint)?;
    if !outcome.within_budget {
        warn!(
            "{} is {}KB, still over the {:?}KB budget at {}px",
            outcome.path.display(),
            outcome.final_bytes / 1024,
            constraint.max_size_kb,
            outcome.final_width
        );
    }

    Ok(OptimizeReport {
        original_bytes,
        outcome,
    })
}
