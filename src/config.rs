//! Config handling

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::log::LevelFilter;
use tracing::{debug, warn};

use crate::constants::{API_KEY_ENV, DOTENV_FILE, SETTINGS_FILE};
use crate::error::NanoBananaError;
use crate::gemini::{ImageSize, Model};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Key/value pairs from the settings file's frontmatter block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Parses the `---` fenced frontmatter at the top of a settings file.
    ///
    /// Only flat `key: value` lines are understood. Anything that doesn't
    /// start with a fence yields empty settings.
    pub fn parse(content: &str) -> Self {
        let mut values = BTreeMap::new();
        let mut lines = content.lines();
        if lines.next().map(str::trim) != Some("---") {
            return Self { values };
        }

        for line in lines {
            if line.trim() == "---" {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            values.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }

        Self { values }
    }

    /// Loads `.claude/nano-banana-pro.local.md` under `cwd`; missing or
    /// unreadable files give empty settings.
    pub fn load(cwd: &Path) -> Self {
        let path = cwd.join(SETTINGS_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Loaded settings from {}", path.display());
                Self::parse(&content)
            }
            Err(_) => Self::default(),
        }
    }

    /// Returns a non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// `gemini_api_key`
    pub fn api_key(&self) -> Option<&str> {
        self.get("gemini_api_key")
    }

    /// `default_aspect`
    pub fn default_aspect(&self) -> Option<&str> {
        self.get("default_aspect")
    }

    /// `default_size`, ignored with a warning when it isn't a known tier
    pub fn default_size(&self) -> Option<ImageSize> {
        let raw = self.get("default_size")?;
        ImageSize::from_str(raw, true)
            .inspect_err(|_| warn!("Ignoring unknown default_size {raw:?} in settings"))
            .ok()
    }

    /// `default_model`, ignored with a warning when it isn't a known model
    pub fn default_model(&self) -> Option<Model> {
        let raw = self.get("default_model")?;
        Model::from_str(raw, true)
            .inspect_err(|_| warn!("Ignoring unknown default_model {raw:?} in settings"))
            .ok()
    }

    /// `output_dir`
    pub fn output_dir(&self) -> Option<&str> {
        self.get("output_dir")
    }

    /// `max_remix_images`
    pub fn max_remix_images(&self) -> Option<usize> {
        let raw = self.get("max_remix_images")?;
        raw.parse()
            .inspect_err(|_| warn!("Ignoring invalid max_remix_images {raw:?} in settings"))
            .ok()
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Everything the credential lookup is allowed to look at.
#[derive(Clone, Debug)]
pub struct LookupContext {
    /// Working directory holding the settings file and workspace `.env`
    pub cwd: PathBuf,
    /// Snapshot of the process environment
    pub env: HashMap<String, String>,
    /// Home directory, if there is one
    pub home: Option<PathBuf>,
}

impl LookupContext {
    /// Captures the current process's working directory, environment and home.
    pub fn from_process() -> Result<Self, NanoBananaError> {
        let cwd = std::env::current_dir().map_err(|err| NanoBananaError::io(".", err))?;
        Ok(Self {
            cwd,
            env: env_snapshot(std::env::vars_os()),
            home: dirs::home_dir(),
        })
    }
}

/// Keeps the variables whose name and value are both valid UTF-8.
fn env_snapshot(vars: impl IntoIterator<Item = (OsString, OsString)>) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// One place an API key may come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// `gemini_api_key` in the settings file
    SettingsFile,
    /// `GEMINI_API_KEY` in the environment
    Environment,
    /// `GEMINI_API_KEY` in `<cwd>/.env`
    WorkspaceDotenv,
    /// `GEMINI_API_KEY` in `<home>/.env`
    HomeDotenv,
}

impl CredentialSource {
    /// Lookup order; the first source that yields a key wins.
    pub const ORDER: [CredentialSource; 4] = [
        CredentialSource::SettingsFile,
        CredentialSource::Environment,
        CredentialSource::WorkspaceDotenv,
        CredentialSource::HomeDotenv,
    ];

    /// Looks for a non-empty key in this source only.
    pub fn lookup(self, ctx: &LookupContext) -> Option<String> {
        match self {
            Self::SettingsFile => Settings::load(&ctx.cwd).api_key().map(str::to_string),
            Self::Environment => ctx
                .env
                .get(API_KEY_ENV)
                .filter(|value| !value.is_empty())
                .cloned(),
            Self::WorkspaceDotenv => dotenv_value(&ctx.cwd.join(DOTENV_FILE), API_KEY_ENV),
            Self::HomeDotenv => ctx
                .home
                .as_ref()
                .and_then(|home| dotenv_value(&home.join(DOTENV_FILE), API_KEY_ENV)),
        }
    }
}

/// Walks [`CredentialSource::ORDER`] and returns the first key found.
pub fn resolve_api_key(ctx: &LookupContext) -> Option<(String, CredentialSource)> {
    CredentialSource::ORDER
        .into_iter()
        .find_map(|source| source.lookup(ctx).map(|key| (key, source)))
}

// dotenv 0.15 only exposes a non-mutating reader through the deprecated
// iterator functions.
#[allow(deprecated)]
fn dotenv_value(path: &Path, key: &str) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let entries = match dotenv::from_path_iter(path) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Failed to read {}: {}", path.display(), err);
            return None;
        }
    };
    entries
        .filter_map(Result::ok)
        .find(|(name, value)| name == key && !value.is_empty())
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(dir: &Path) -> LookupContext {
        LookupContext {
            cwd: dir.join("work"),
            env: HashMap::new(),
            home: Some(dir.join("home")),
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn parses_frontmatter_and_strips_quotes() {
        let settings = Settings::parse(
            "---\ngemini_api_key: \"abc123\"\ndefault_aspect: '16:9'\nnot a pair\nmax_remix_images: 4\n---\nbody: ignored\n",
        );
        assert_eq!(settings.api_key(), Some("abc123"));
        assert_eq!(settings.default_aspect(), Some("16:9"));
        assert_eq!(settings.max_remix_images(), Some(4));
        assert_eq!(settings.get("body"), None);
    }

    #[test]
    fn no_fence_means_no_settings() {
        let settings = Settings::parse("gemini_api_key: abc\n");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn typed_defaults_ignore_unknown_values() {
        let settings =
            Settings::parse("---\ndefault_size: 2k\ndefault_model: turbo\nmax_remix_images: x\n---\n");
        assert_eq!(settings.default_size(), Some(ImageSize::TwoK));
        assert_eq!(settings.default_model(), None);
        assert_eq!(settings.max_remix_images(), None);
    }

    #[test]
    fn settings_file_wins_over_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = context(dir.path());
        write(
            &ctx.cwd.join(SETTINGS_FILE),
            "---\ngemini_api_key: from-settings\n---\n",
        );
        write(&ctx.cwd.join(".env"), "GEMINI_API_KEY=from-workspace\n");
        ctx.env.insert(API_KEY_ENV.to_string(), "from-env".to_string());

        assert_eq!(
            resolve_api_key(&ctx),
            Some(("from-settings".to_string(), CredentialSource::SettingsFile))
        );
    }

    #[test]
    fn falls_through_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = context(dir.path());
        write(&ctx.home.clone().expect("home").join(".env"), "GEMINI_API_KEY=from-home\n");
        assert_eq!(
            resolve_api_key(&ctx),
            Some(("from-home".to_string(), CredentialSource::HomeDotenv))
        );

        write(&ctx.cwd.join(".env"), "OTHER=1\nGEMINI_API_KEY=from-workspace\n");
        assert_eq!(
            resolve_api_key(&ctx).map(|(_, source)| source),
            Some(CredentialSource::WorkspaceDotenv)
        );

        ctx.env.insert(API_KEY_ENV.to_string(), String::new());
        assert_eq!(
            resolve_api_key(&ctx).map(|(_, source)| source),
            Some(CredentialSource::WorkspaceDotenv)
        );

        ctx.env.insert(API_KEY_ENV.to_string(), "from-env".to_string());
        assert_eq!(
            resolve_api_key(&ctx),
            Some(("from-env".to_string(), CredentialSource::Environment))
        );
    }

    #[cfg(unix)]
    #[test]
    fn env_snapshot_skips_non_utf8() {
        use std::os::unix::ffi::OsStringExt;

        let env = env_snapshot([
            (OsString::from("GEMINI_API_KEY"), OsString::from("k")),
            (OsString::from("BROKEN"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0xc3, 0x28]), OsString::from("x")),
        ]);
        assert_eq!(
            env,
            HashMap::from([("GEMINI_API_KEY".to_string(), "k".to_string())])
        );
    }

    #[test]
    fn nothing_anywhere() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = context(dir.path());
        ctx.home = None;
        assert_eq!(resolve_api_key(&ctx), None);
    }
}
