//! Resize backends: macOS `sips`, or the `image` crate everywhere else.

use std::env;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use crate::error::NanoBananaError;

/// The two things the fit loop needs from an image tool.
pub trait ResizeBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// (width, height) in pixels.
    fn dimensions(&self, path: &Path) -> Result<(u32, u32), NanoBananaError>;

    /// Writes `src` scaled to `width` (aspect preserved) to `dst`, which may
    /// be the same path.
    fn resize_to_width(&self, src: &Path, dst: &Path, width: u32) -> Result<(), NanoBananaError>;
}

/// Which backend to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// macOS `sips`
    Sips,
    /// In-process decode/resize/encode
    Raster,
}

impl BackendKind {
    /// `sips` on macOS when it's on the PATH, otherwise raster.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") && on_path("sips") {
            BackendKind::Sips
        } else {
            BackendKind::Raster
        }
    }

    /// Boxes the backend.
    pub fn backend(self) -> Box<dyn ResizeBackend> {
        match self {
            BackendKind::Sips => Box::new(SipsBackend),
            BackendKind::Raster => Box::new(RasterBackend),
        }
    }
}

fn on_path(program: &str) -> bool {
    env::var_os("PATH")
        .is_some_and(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
}

/// Shells out to macOS `sips`.
#[derive(Debug, Default)]
pub struct SipsBackend;

impl SipsBackend {
    fn run(args: &[&OsStr]) -> Result<String, NanoBananaError> {
        let output = Command::new("sips")
            .args(args)
            .output()
            .map_err(|err| NanoBananaError::Backend(format!("failed to run sips: {err}")))?;
        if !output.status.success() {
            return Err(NanoBananaError::Backend(format!(
                "sips exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Reads `pixelWidth: N` / `pixelHeight: N` lines from `sips -g` output.
pub fn parse_sips_dimensions(output: &str) -> Option<(u32, u32)> {
    let mut width = None;
    let mut height = None;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        match key.trim() {
            "pixelWidth" => width = value.trim().parse().ok(),
            "pixelHeight" => height = value.trim().parse().ok(),
            _ => {}
        }
    }
    Some((width?, height?))
}

impl ResizeBackend for SipsBackend {
    fn name(&self) -> &'static str {
        "sips"
    }

    fn dimensions(&self, path: &Path) -> Result<(u32, u32), NanoBananaError> {
        let output = Self::run(&[
            OsStr::new("-g"),
            OsStr::new("pixelWidth"),
            OsStr::new("-g"),
            OsStr::new("pixelHeight"),
            path.as_os_str(),
        ])?;
        parse_sips_dimensions(&output).ok_or_else(|| {
            NanoBananaError::Backend(format!("sips gave no dimensions for {}", path.display()))
        })
    }

    fn resize_to_width(&self, src: &Path, dst: &Path, width: u32) -> Result<(), NanoBananaError> {
        let width = width.to_string();
        Self::run(&[
            OsStr::new("--resampleWidth"),
            OsStr::new(&width),
            src.as_os_str(),
            OsStr::new("--out"),
            dst.as_os_str(),
        ])?;
        Ok(())
    }
}

/// Decodes, resizes with Lanczos3 and re-encodes using the `image` crate.
#[derive(Debug, Default)]
pub struct RasterBackend;

fn open(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, NanoBananaError> {
    ImageReader::open(path)
        .map_err(|err| NanoBananaError::io(path, err))?
        .with_guessed_format()
        .map_err(|err| NanoBananaError::io(path, err))
}

impl ResizeBackend for RasterBackend {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn dimensions(&self, path: &Path) -> Result<(u32, u32), NanoBananaError> {
        Ok(open(path)?.into_dimensions()?)
    }

    fn resize_to_width(&self, src: &Path, dst: &Path, width: u32) -> Result<(), NanoBananaError> {
        let image = open(src)?.decode()?;
        let resized = if image.width() <= width {
            if src == dst {
                return Ok(());
            }
            image
        } else {
            let height =
                u64::from(image.height()) * u64::from(width) / u64::from(image.width());
            let height = u32::try_from(height).unwrap_or(u32::MAX).max(1);
            debug!(
                "Resizing {}x{} -> {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            image.resize_exact(width, height, FilterType::Lanczos3)
        };

        let format = ImageFormat::from_path(dst).unwrap_or(ImageFormat::Png);
        let resized = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };
        resized.save_with_format(dst, format)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sips_output() {
        let output = "/tmp/cat.png\n  pixelWidth: 2000\n  pixelHeight: 1500\n";
        assert_eq!(parse_sips_dimensions(output), Some((2000, 1500)));
        assert_eq!(parse_sips_dimensions("/tmp/cat.png\n  pixelWidth: 20\n"), None);
        assert_eq!(parse_sips_dimensions(""), None);
    }

    #[test]
    fn explicit_kinds() {
        assert_eq!(BackendKind::Sips.backend().name(), "sips");
        assert_eq!(BackendKind::Raster.backend().name(), "raster");
        if !cfg!(target_os = "macos") {
            assert_eq!(BackendKind::detect(), BackendKind::Raster);
        }
    }
}
