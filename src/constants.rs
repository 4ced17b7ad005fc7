//! Shared constants/setters for things
//!

use std::time::Duration;

/// Default Gemini API base URL, without a trailing slash
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Header carrying the API key on every Gemini request
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Environment variable (and `.env` key) holding the API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Settings file, relative to the working directory
pub const SETTINGS_FILE: &str = ".claude/nano-banana-pro.local.md";

/// Dotfile consulted in the working directory and then the home directory
pub const DOTENV_FILE: &str = ".env";

/// Where generated images land when neither `--out` nor `output_dir` is set
pub const DEFAULT_OUTPUT_DIR: &str = ".nanobanana/out";

/// Aspect ratio used when neither the CLI nor the settings file has one
pub const DEFAULT_ASPECT: &str = "1:1";

/// How many reference images `remix-url` passes to the model by default
pub const DEFAULT_MAX_REMIX_IMAGES: usize = 2;

/// Per-image download cap for `remix-url` reference images
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 4_000_000;

/// Cap on the remixed page's HTML
pub const MAX_PAGE_BYTES: usize = 2_000_000;

/// Timeout for page and reference image fetches
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the generateContent call
pub const API_TIMEOUT: Duration = Duration::from_secs(90);

/// User-Agent sent on every request
pub const USER_AGENT: &str = concat!("nanobanana/", env!("CARGO_PKG_VERSION"));

/// Most shrink steps the optimizer will take chasing a byte budget
pub const MAX_SHRINK_ATTEMPTS: usize = 10;

/// The optimizer never shrinks below this width
pub const MIN_SHRINK_WIDTH: u32 = 100;
