//! `remix-url` support: page fetch, reference image downloads and the
//! combined prompt.

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};
use url::Url;

use crate::constants::{FETCH_TIMEOUT, MAX_PAGE_BYTES};
use crate::error::NanoBananaError;
use crate::gemini::{ImagePart, mime_from_extension};
use crate::hints::PageHints;

/// Body and content type of a capped GET.
#[derive(Debug)]
pub struct Fetched {
    /// Response body, at most the requested cap
    pub bytes: Vec<u8>,
    /// `Content-Type` without parameters, lower-cased; empty when absent
    pub content_type: String,
}

/// GETs `url`, failing on non-2xx responses or bodies over `max_bytes`.
pub async fn fetch_capped(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<Fetched, NanoBananaError> {
    let mut resp = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|err| NanoBananaError::network(format!("fetching {url}"), err))?;

    if !resp.status().is_success() {
        return Err(NanoBananaError::HttpStatus {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let too_large = || NanoBananaError::TooLarge {
        url: url.to_string(),
        max_bytes,
    };
    if resp
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|err| NanoBananaError::network(format!("reading {url}"), err))?
    {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > max_bytes {
            return Err(too_large());
        }
    }

    Ok(Fetched {
        bytes,
        content_type,
    })
}

/// Fetches the page to remix as (lossy) UTF-8.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, NanoBananaError> {
    let fetched = fetch_capped(client, url, MAX_PAGE_BYTES).await?;
    debug!("Fetched {} bytes of HTML from {}", fetched.bytes.len(), url);
    Ok(String::from_utf8_lossy(&fetched.bytes).into_owned())
}

/// Guesses an image MIME type from the URL's path extension.
pub fn guess_mime_from_url(url: &str) -> &'static str {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    path.rsplit_once('.')
        .and_then(|(_, ext)| mime_from_extension(ext))
        .unwrap_or("application/octet-stream")
}

/// Downloads up to `max_images` reference images, in order.
///
/// Failures of any kind (network, status, oversize, non-image content) skip
/// that one candidate.
pub async fn download_reference_images(
    client: &reqwest::Client,
    urls: &[String],
    max_images: usize,
    max_bytes: usize,
) -> Vec<ImagePart> {
    let mut parts = Vec::new();
    for url in urls {
        if parts.len() >= max_images {
            break;
        }
        let fetched = match fetch_capped(client, url, max_bytes).await {
            Ok(fetched) => fetched,
            Err(err) => {
                debug!("Skipping reference image: {}", err);
                continue;
            }
        };
        let mime = if fetched.content_type.is_empty() {
            guess_mime_from_url(url).to_string()
        } else {
            fetched.content_type
        };
        if !mime.starts_with("image/") {
            debug!("Skipping reference image {} with type {}", url, mime);
            continue;
        }
        info!("Using reference image {} ({}, {} bytes)", url, mime, fetched.bytes.len());
        parts.push(ImagePart::from_bytes(mime, &fetched.bytes));
    }
    parts
}

/// Builds the text prompt for a remix from the page hints and the user's ask.
pub fn build_remix_prompt(hints: &PageHints, user_prompt: &str) -> String {
    let style_lines = hints.style_lines();
    let style = if style_lines.is_empty() {
        "- (none found)".to_string()
    } else {
        style_lines
            .iter()
            .map(|line| format!("- {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Create a new visual asset inspired by a webpage.
Treat the page as style direction only; do not reproduce its copyrighted imagery.

Webpage URL: {url}
Title: {title}
Description: {description}

Style hints extracted from the page:
{style}

User request:
{request}

Design requirements:
- Clean, slide-ready composition
- Clear typography, no tiny text
- Consistent margins and alignment
- Any text must match the user's wording exactly
- Take cues from the extracted palette and typography"#,
        url = hints.url,
        title = hints.title,
        description = hints.description,
        request = user_prompt.trim(),
    )
}
