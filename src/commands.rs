//! `gen`, `edit` and `remix-url`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cli::{CliOptions, Command, CommonArgs, RemixArgs};
use crate::config::{LookupContext, Settings, resolve_api_key};
use crate::constants::{DEFAULT_ASPECT, DEFAULT_MAX_REMIX_IMAGES, DEFAULT_OUTPUT_DIR};
use crate::error::NanoBananaError;
use crate::gemini::{GeminiClient, GenerationOptions, ImagePart, Part, http_client};
use crate::hints::extract_page_hints;
use crate::remix::{build_remix_prompt, download_reference_images, fetch_page};

/// Explicit flags first, then the settings file, then built-in defaults.
pub fn generation_options(common: &CommonArgs, settings: &Settings) -> GenerationOptions {
    GenerationOptions {
        aspect: common
            .aspect
            .clone()
            .or_else(|| settings.default_aspect().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ASPECT.to_string()),
        size: common.size.or_else(|| settings.default_size()),
        use_search: common.search,
        model: common
            .model
            .or_else(|| settings.default_model())
            .unwrap_or_default(),
    }
}

/// `--out` if given, else a timestamped PNG in the configured output dir.
/// Relative paths are taken from `cwd`.
pub fn output_path(
    out: Option<&Path>,
    settings: &Settings,
    cwd: &Path,
    now: DateTime<Utc>,
) -> PathBuf {
    if let Some(out) = out {
        return cwd.join(out);
    }
    let dir = cwd.join(settings.output_dir().unwrap_or(DEFAULT_OUTPUT_DIR));
    let stamp = now.format("%Y-%m-%dT%H-%M-%S-%6f");
    dir.join(format!("nanobanana-{stamp}.png"))
}

/// Writes the image, creating parent directories as needed.
pub fn save_image(path: &Path, bytes: &[u8]) -> Result<(), NanoBananaError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| NanoBananaError::io(parent, err))?;
    }
    fs::write(path, bytes).map_err(|err| NanoBananaError::io(path, err))
}

async fn remix_parts(
    client: &reqwest::Client,
    args: &RemixArgs,
    settings: &Settings,
) -> Result<Vec<Part>, NanoBananaError> {
    let html = fetch_page(client, &args.url).await?;
    let hints = extract_page_hints(&html, &args.url);
    debug!("Page hints: {:?}", hints);

    let max_images = args
        .max_images
        .or_else(|| settings.max_remix_images())
        .unwrap_or(DEFAULT_MAX_REMIX_IMAGES);
    let images = download_reference_images(
        client,
        &hints.reference_candidates(),
        max_images,
        args.max_bytes,
    )
    .await;
    info!("Passing {} reference image(s) from {}", images.len(), args.url);

    let mut parts = vec![Part::text(build_remix_prompt(&hints, &args.prompt))];
    parts.extend(images.into_iter().map(Part::from));
    Ok(parts)
}

/// Runs a `nanobanana` invocation and returns the path of the saved image.
///
/// The API key is resolved before anything touches the network, and nothing
/// is written until the API has returned an image.
pub async fn run(cli: &CliOptions, ctx: &LookupContext) -> Result<PathBuf, NanoBananaError> {
    let (api_key, source) = resolve_api_key(ctx).ok_or(NanoBananaError::MissingApiKey)?;
    debug!("Using API key from {:?}", source);

    let settings = Settings::load(&ctx.cwd);
    let client = http_client()?;
    let gemini = GeminiClient::new(client.clone(), api_key, &cli.api_base);

    let (common, parts) = match &cli.command {
        Command::Gen(args) => (&args.common, vec![Part::text(args.prompt.as_str())]),
        Command::Edit(args) => {
            let image = ImagePart::from_file(&ctx.cwd.join(&args.input))?;
            (&args.common, vec![Part::text(args.prompt.as_str()), image.into()])
        }
        Command::RemixUrl(args) => (&args.common, remix_parts(&client, args, &settings).await?),
    };

    let options = generation_options(common, &settings);
    let out = output_path(common.out.as_deref(), &settings, &ctx.cwd, Utc::now());

    let bytes = gemini.generate(&parts, &options).await?;
    save_image(&out, &bytes)?;
    info!("Saved {} bytes to {}", bytes.len(), out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{ImageSize, Model};
    use chrono::TimeZone;
    use clap::Parser;
    use std::collections::HashMap;

    fn common(args: &[&str]) -> CommonArgs {
        let mut argv = vec!["nanobanana", "gen", "--prompt", "x"];
        argv.extend_from_slice(args);
        match CliOptions::try_parse_from(argv).expect("parse").command {
            Command::Gen(args) => args.common,
            _ => panic!("expected gen"),
        }
    }

    #[test]
    fn built_in_defaults() {
        let options = generation_options(&common(&[]), &Settings::default());
        assert_eq!(
            options,
            GenerationOptions {
                aspect: "1:1".to_string(),
                size: None,
                use_search: false,
                model: Model::Pro,
            }
        );
    }

    #[test]
    fn flags_beat_settings() {
        let settings = Settings::parse(
            "---\ndefault_aspect: 4:3\ndefault_size: 1K\ndefault_model: flash\n---\n",
        );
        let from_settings = generation_options(&common(&[]), &settings);
        assert_eq!(from_settings.aspect, "4:3");
        assert_eq!(from_settings.size, Some(ImageSize::OneK));
        assert_eq!(from_settings.model, Model::Flash);

        let from_flags = generation_options(
            &common(&["--aspect", "16:9", "--size", "4K", "--model", "pro", "--search"]),
            &settings,
        );
        assert_eq!(from_flags.aspect, "16:9");
        assert_eq!(from_flags.size, Some(ImageSize::FourK));
        assert_eq!(from_flags.model, Model::Pro);
        assert!(from_flags.use_search);
    }

    #[test]
    fn output_paths() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 4, 5, 6, 7)
            .single()
            .expect("timestamp");
        let cwd = Path::new("/work");
        assert_eq!(
            output_path(None, &Settings::default(), cwd, now),
            PathBuf::from("/work/.nanobanana/out/nanobanana-2026-03-04T05-06-07-000000.png")
        );
        let settings = Settings::parse("---\noutput_dir: renders\n---\n");
        assert_eq!(
            output_path(None, &settings, cwd, now),
            PathBuf::from("/work/renders/nanobanana-2026-03-04T05-06-07-000000.png")
        );
        assert_eq!(
            output_path(Some(Path::new("x/y.png")), &settings, cwd, now),
            PathBuf::from("/work/x/y.png")
        );
        assert_eq!(
            output_path(Some(Path::new("/abs/y.png")), &settings, cwd, now),
            PathBuf::from("/abs/y.png")
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = LookupContext {
            cwd: dir.path().to_path_buf(),
            env: HashMap::new(),
            home: None,
        };
        // Nothing listens on port 9; a network attempt would be a Network error.
        let cli = CliOptions::try_parse_from([
            "nanobanana",
            "--api-base",
            "http://127.0.0.1:9",
            "remix-url",
            "--url",
            "http://127.0.0.1:9/page",
            "--prompt",
            "x",
        ])
        .expect("parse");
        let err = run(&cli, &ctx).await.expect_err("no key");
        assert!(matches!(err, NanoBananaError::MissingApiKey));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[tokio::test]
    async fn missing_edit_input_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = LookupContext {
            cwd: dir.path().to_path_buf(),
            env: HashMap::from([("GEMINI_API_KEY".to_string(), "k".to_string())]),
            home: None,
        };
        let cli = CliOptions::try_parse_from([
            "nanobanana",
            "--api-base",
            "http://127.0.0.1:9",
            "edit",
            "--prompt",
            "x",
            "--in",
            "gone.png",
        ])
        .expect("parse");
        let err = run(&cli, &ctx).await.expect_err("missing input");
        assert!(matches!(err, NanoBananaError::NotFound(_)));
    }
}
