//! CLI parsers for `nanobanana` and `optimize`
use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::constants::{DEFAULT_API_BASE, DEFAULT_MAX_IMAGE_BYTES};
use crate::gemini::{ImageSize, Model};
use crate::optimize::backend::BackendKind;
use crate::optimize::{ByteSize, Preset};

#[derive(Parser, Debug)]
#[command(name = "nanobanana", version)]
/// Generate and edit images with Gemini image models.
pub struct CliOptions {
    #[clap(long, global = true, help = "Enable debug logging", env = "NANOBANANA_DEBUG")]
    /// Enable debug logging. Env: NANOBANANA_DEBUG
    pub debug: bool,

    #[clap(
        long,
        global = true,
        hide = true,
        default_value = DEFAULT_API_BASE,
        env = "NANOBANANA_API_BASE"
    )]
    /// Gemini API base URL. Env: NANOBANANA_API_BASE
    pub api_base: String,

    #[command(subcommand)]
    /// What to do
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// nanobanana subcommands
pub enum Command {
    /// Generate an image from a prompt
    Gen(GenArgs),
    /// Edit an image with a prompt + input image
    Edit(EditArgs),
    /// Fetch a webpage and remix it into an image
    RemixUrl(RemixArgs),
}

#[derive(Args, Debug, Clone)]
/// Flags every subcommand accepts.
pub struct CommonArgs {
    #[clap(long)]
    /// Aspect ratio like "1:1", "16:9", "4:3" (default from settings or 1:1)
    pub aspect: Option<String>,

    #[clap(long, value_enum)]
    /// Image size tier (default from settings)
    pub size: Option<ImageSize>,

    #[clap(long)]
    /// Enable Google Search grounding
    pub search: bool,

    #[clap(long, value_enum)]
    /// Gemini model (default from settings or pro)
    pub model: Option<Model>,

    #[clap(long)]
    /// Output path (PNG)
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
/// `gen` arguments
pub struct GenArgs {
    #[clap(long)]
    /// Text prompt
    pub prompt: String,

    #[command(flatten)]
    /// Shared flags
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
/// `edit` arguments
pub struct EditArgs {
    #[clap(long)]
    /// Edit instructions
    pub prompt: String,

    #[clap(long = "in", value_name = "PATH")]
    /// Input image path (PNG recommended)
    pub input: PathBuf,

    #[command(flatten)]
    /// Shared flags
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
/// `remix-url` arguments
pub struct RemixArgs {
    #[clap(long)]
    /// Webpage URL
    pub url: String,

    #[clap(long)]
    /// What to create from the page
    pub prompt: String,

    #[clap(long)]
    /// Max reference images to download and pass (default from settings or 2)
    pub max_images: Option<usize>,

    #[clap(long, default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    /// Max bytes per reference image
    pub max_bytes: usize,

    #[command(flatten)]
    /// Shared flags
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(name = "optimize", version)]
/// Optimize images for GitHub, Slack, web, etc.
pub struct OptimizeOptions {
    /// Path to image to optimize
    pub image: PathBuf,

    #[clap(long, value_enum)]
    /// Use a named preset (github, slack, web, thumbnail)
    pub preset: Option<Preset>,

    #[clap(long)]
    /// Maximum file size (e.g. 500KB, 1MB)
    pub max_size: Option<ByteSize>,

    #[clap(long)]
    /// Maximum width in pixels
    pub width: Option<NonZeroU32>,

    #[clap(long)]
    /// Output path (default: <original>-optimized.<ext>)
    pub out: Option<PathBuf>,

    #[clap(long, value_enum)]
    /// Force a resize backend instead of picking one for this platform
    pub backend: Option<BackendKind>,

    #[clap(long, help = "Enable debug logging", env = "NANOBANANA_DEBUG")]
    /// Enable debug logging. Env: NANOBANANA_DEBUG
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remix_flags() {
        let cli = CliOptions::try_parse_from([
            "nanobanana",
            "remix-url",
            "--url",
            "https://ex.com",
            "--prompt",
            "banner",
            "--max-images",
            "3",
            "--size",
            "2K",
            "--model",
            "flash",
            "--search",
        ])
        .expect("parse");
        let Command::RemixUrl(args) = cli.command else {
            panic!("expected remix-url");
        };
        assert_eq!(args.max_images, Some(3));
        assert_eq!(args.max_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(args.common.size, Some(ImageSize::TwoK));
        assert_eq!(args.common.model, Some(Model::Flash));
        assert!(args.common.search);
    }

    #[test]
    fn edit_needs_input() {
        assert!(CliOptions::try_parse_from(["nanobanana", "edit", "--prompt", "x"]).is_err());
        let cli =
            CliOptions::try_parse_from(["nanobanana", "edit", "--prompt", "x", "--in", "cat.png"])
                .expect("parse");
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.input, PathBuf::from("cat.png"));
    }

    #[test]
    fn optimize_flags() {
        let opts = OptimizeOptions::try_parse_from([
            "optimize",
            "cat.png",
            "--preset",
            "slack",
            "--max-size",
            "1MB",
            "--width",
            "640",
        ])
        .expect("parse");
        assert_eq!(opts.preset, Some(Preset::Slack));
        assert_eq!(opts.max_size, Some(ByteSize(1024 * 1024)));
        assert_eq!(opts.width.map(NonZeroU32::get), Some(640));
        assert!(
            OptimizeOptions::try_parse_from(["optimize", "cat.png", "--preset", "tiktok"]).is_err()
        );
        assert!(OptimizeOptions::try_parse_from(["optimize", "cat.png", "--width", "0"]).is_err());
    }
}
