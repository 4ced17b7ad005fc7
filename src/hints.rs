//! Style hints scraped from a webpage's HTML.
//!
//! Everything here is best-effort pattern matching: a missing tag gives an
//! empty field, never an error, and no network access happens.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

const MAX_PALETTE: usize = 6;
const MAX_GOOGLE_FONTS: usize = 3;
const MAX_FONT_FAMILIES: usize = 5;

#[allow(clippy::expect_used)] // literal patterns, exercised by the tests below
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hint pattern should compile")
}

static TITLE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)<title[^>]*>([^<]*)</title>"));
static META_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<meta\b[^>]*>"));
static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<link\b[^>]*>"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"#(?:[0-9a-fA-F]{8}|[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b"));
static FULL_HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^#(?:[0-9a-fA-F]{8}|[0-9a-fA-F]{6}|[0-9a-fA-F]{3})$"));
static GOOGLE_FONTS: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?i)https?://fonts\.googleapis\.com/css[^"'\s<>)]+"#));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<style[^>]*>(.*?)</style>"));
static FONT_FAMILY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)font-family\s*:\s*([^;{}]+)"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));

/// What a page tells us about its visual style.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PageHints {
    /// The page the HTML came from
    pub url: String,
    /// `<title>` text
    pub title: String,
    /// Meta description, falling back to `og:description`
    pub description: String,
    /// Raw `theme-color` meta value
    pub theme_color: Option<String>,
    /// Up to six distinct hex colors, theme color first
    pub palette: Vec<String>,
    /// Up to three Google Fonts stylesheet URLs
    pub google_fonts: Vec<String>,
    /// Up to five `font-family` values from inline styles
    pub font_families: Vec<String>,
    /// Absolute `og:image` / `twitter:image` URLs
    pub image_urls: Vec<String>,
    /// Absolute favicon / touch icon URLs
    pub icon_urls: Vec<String>,
}

impl PageHints {
    /// Candidate reference images: page images, then at most one icon.
    pub fn reference_candidates(&self) -> Vec<String> {
        self.image_urls
            .iter()
            .chain(self.icon_urls.first())
            .cloned()
            .collect()
    }

    /// Human readable style hint lines for the remix prompt.
    pub fn style_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(theme) = &self.theme_color {
            lines.push(format!("Theme color: {theme}"));
        }
        if !self.palette.is_empty() {
            lines.push(format!("Palette candidates: {}", self.palette.join(", ")));
        }
        if !self.google_fonts.is_empty() {
            lines.push(format!("Google Fonts CSS: {}", self.google_fonts.join(" | ")));
        }
        if !self.font_families.is_empty() {
            lines.push(format!(
                "font-family hints: {}",
                self.font_families.join(" | ")
            ));
        }
        lines
    }
}

/// A tag's attributes, names lower-cased, in source order.
struct Tag {
    attributes: Vec<(String, String)>,
}

impl Tag {
    fn parse(raw: &str) -> Self {
        let attributes = ATTRIBUTE
            .captures_iter(raw)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str().to_ascii_lowercase();
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
                Some((name, value.to_string()))
            })
            .collect();
        Self { attributes }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// True when `attribute` equals `value`, ignoring case and padding.
    fn is(&self, attribute: &str, value: &str) -> bool {
        self.attr(attribute)
            .is_some_and(|found| found.trim().eq_ignore_ascii_case(value))
    }

    /// Trimmed, entity-decoded, non-empty value of `attribute`.
    fn value(&self, attribute: &str) -> Option<String> {
        self.attr(attribute)
            .map(decode)
            .filter(|value| !value.is_empty())
    }
}

fn decode(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).into_owned()
}

fn tags(pattern: &Regex, html: &str) -> Vec<Tag> {
    pattern
        .find_iter(html)
        .map(|found| Tag::parse(found.as_str()))
        .collect()
}

fn first_meta(metas: &[Tag], attribute: &str, name: &str) -> Option<String> {
    metas
        .iter()
        .filter(|tag| tag.is(attribute, name))
        .find_map(|tag| tag.value("content"))
}

fn push_unique(items: &mut Vec<String>, seen: &mut HashSet<String>, item: String) {
    if seen.insert(item.clone()) {
        items.push(item);
    }
}

fn resolve(base: Option<&Url>, raw: &str) -> Option<String> {
    match base {
        Some(base) => base.join(raw).ok().map(String::from),
        None => Url::parse(raw).ok().map(String::from),
    }
}

fn palette(html: &str, theme_color: Option<&str>) -> Vec<String> {
    let mut palette: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    let theme = theme_color.filter(|color| FULL_HEX_COLOR.is_match(color));
    let found = HEX_COLOR.find_iter(html).map(|m| m.as_str());
    for color in theme.into_iter().chain(found) {
        if palette.len() >= MAX_PALETTE {
            break;
        }
        if seen.insert(color.to_ascii_lowercase()) {
            palette.push(color.to_string());
        }
    }
    palette
}

fn google_fonts(html: &str) -> Vec<String> {
    let mut fonts = Vec::new();
    let mut seen = HashSet::new();
    for found in GOOGLE_FONTS.find_iter(html) {
        if fonts.len() >= MAX_GOOGLE_FONTS {
            break;
        }
        push_unique(&mut fonts, &mut seen, found.as_str().to_string());
    }
    fonts
}

fn font_families(html: &str) -> Vec<String> {
    let mut families = Vec::new();
    let mut seen = HashSet::new();
    let declarations = STYLE_BLOCK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .flat_map(|block| FONT_FAMILY.captures_iter(block.as_str()))
        .filter_map(|caps| caps.get(1));
    for declaration in declarations {
        if families.len() >= MAX_FONT_FAMILIES {
            break;
        }
        let cleaned = WHITESPACE
            .replace_all(declaration.as_str(), " ")
            .trim()
            .to_string();
        if !cleaned.is_empty() {
            push_unique(&mut families, &mut seen, cleaned);
        }
    }
    families
}

/// Scrapes style hints out of `html`, which was fetched from `url`.
pub fn extract_page_hints(html: &str, url: &str) -> PageHints {
    let base = Url::parse(url).ok();
    let metas = tags(&META_TAG, html);
    let links = tags(&LINK_TAG, html);

    let title = TITLE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode(m.as_str()))
        .unwrap_or_default();

    let description = first_meta(&metas, "name", "description")
        .or_else(|| first_meta(&metas, "property", "og:description"))
        .unwrap_or_default();

    let theme_color = first_meta(&metas, "name", "theme-color");

    let mut image_urls = Vec::new();
    let mut seen = HashSet::new();
    let og_images = metas.iter().filter(|tag| tag.is("property", "og:image"));
    let twitter_images = metas
        .iter()
        .filter(|tag| tag.is("name", "twitter:image") || tag.is("name", "twitter:image:src"));
    for tag in og_images.chain(twitter_images) {
        if let Some(resolved) = tag
            .value("content")
            .and_then(|raw| resolve(base.as_ref(), &raw))
        {
            push_unique(&mut image_urls, &mut seen, resolved);
        }
    }

    let mut icon_urls = Vec::new();
    let mut seen = HashSet::new();
    let icons = links.iter().filter(|tag| {
        tag.is("rel", "icon") || tag.is("rel", "shortcut icon") || tag.is("rel", "apple-touch-icon")
    });
    for tag in icons {
        if let Some(resolved) = tag
            .value("href")
            .and_then(|raw| resolve(base.as_ref(), &raw))
        {
            push_unique(&mut icon_urls, &mut seen, resolved);
        }
    }

    PageHints {
        url: url.to_string(),
        title,
        description,
        palette: palette(html, theme_color.as_deref()),
        theme_color,
        google_fonts: google_fonts(html),
        font_families: font_families(html),
        image_urls,
        icon_urls,
    }
}
