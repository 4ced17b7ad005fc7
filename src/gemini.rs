//! Gemini generateContent client and wire types.
//!
//! Docs: <https://ai.google.dev/api/generate-content>

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{API_KEY_HEADER, API_TIMEOUT, USER_AGENT};
use crate::error::NanoBananaError;

/// Which Gemini image model to call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Model {
    /// Gemini 3 Pro Image
    #[default]
    Pro,
    /// Gemini 2.0 Flash image generation
    Flash,
}

impl Model {
    /// Model id used in the endpoint path.
    pub fn model_id(self) -> &'static str {
        match self {
            Model::Pro => "gemini-3-pro-image-preview",
            Model::Flash => "gemini-2.0-flash-preview-image-generation",
        }
    }
}

/// Output size tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ImageSize {
    /// 1K
    #[value(name = "1K")]
    OneK,
    /// 2K
    #[value(name = "2K")]
    TwoK,
    /// 4K
    #[value(name = "4K")]
    FourK,
}

impl ImageSize {
    /// Value sent as `imageConfig.imageSize`.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

/// Inline image data, base64 encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImagePart {
    /// e.g. `image/png`
    pub mime_type: String,
    /// Standard base64 of the image bytes
    pub data: String,
}

impl ImagePart {
    /// Encodes raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Reads a local image; the MIME type comes from the extension and
    /// defaults to PNG.
    pub fn from_file(path: &Path) -> Result<Self, NanoBananaError> {
        if !path.exists() {
            return Err(NanoBananaError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|err| NanoBananaError::io(path, err))?;
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_from_extension)
            .unwrap_or("image/png");
        Ok(Self::from_bytes(mime, &bytes))
    }
}

/// Maps a file extension to an image MIME type.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "ico" => Some("image/x-icon"),
        _ => None,
    }
}

/// One entry of `contents[].parts`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Prompt text
    Text {
        /// The text
        text: String,
    },
    /// An inline image
    InlineData {
        /// The image
        inline_data: ImagePart,
    },
}

impl Part {
    /// Text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

impl From<ImagePart> for Part {
    fn from(inline_data: ImagePart) -> Self {
        Part::InlineData { inline_data }
    }
}

/// Generation knobs shared by every subcommand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Aspect ratio like `1:1` or `16:9`
    pub aspect: String,
    /// Optional size tier
    pub size: Option<ImageSize>,
    /// Enable Google Search grounding
    pub use_search: bool,
    /// Model to call
    pub model: Model,
}

#[derive(Serialize, Debug)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<[Tool; 1]>,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    parts: &'a [Part],
}

#[derive(Serialize, Debug)]
struct GenerationConfig<'a> {
    #[serde(rename = "responseModalities")]
    response_modalities: [&'static str; 2],
    #[serde(rename = "imageConfig")]
    image_config: ImageConfig<'a>,
}

#[derive(Serialize, Debug)]
struct ImageConfig<'a> {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: &'a str,
    #[serde(rename = "imageSize", skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

#[derive(Serialize, Debug)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize, Debug)]
struct GoogleSearch {}

/// Builds the JSON body for a generateContent call.
pub fn request_body(parts: &[Part], options: &GenerationOptions) -> serde_json::Value {
    let request = GenerateContentRequest {
        contents: [Content { parts }],
        generation_config: GenerationConfig {
            response_modalities: ["TEXT", "IMAGE"],
            image_config: ImageConfig {
                aspect_ratio: &options.aspect,
                image_size: options.size.map(ImageSize::as_str),
            },
        },
        tools: options.use_search.then_some([Tool {
            google_search: GoogleSearch {},
        }]),
    };
    serde_json::to_value(request).unwrap_or_default()
}

#[derive(Deserialize, Debug, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize, Debug)]
struct ResponseInlineData {
    #[serde(default)]
    data: Option<String>,
}

/// Pulls the first inline image out of the first candidate and decodes it.
pub fn extract_first_image(body: &[u8]) -> Result<Vec<u8>, NanoBananaError> {
    let parsed: GenerateContentResponse = serde_json::from_slice(body)?;
    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    for part in &parts {
        if let Some(text) = part.text.as_deref().filter(|text| !text.trim().is_empty()) {
            info!("Model said: {}", text.trim());
        }
    }

    let b64 = parts
        .into_iter()
        .filter_map(|part| part.inline_data)
        .find_map(|inline| inline.data.filter(|data| !data.is_empty()))
        .ok_or(NanoBananaError::NoImage)?;

    Ok(general_purpose::STANDARD.decode(b64)?)
}

/// Thin client for the generateContent endpoint.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl GeminiClient {
    /// Creates a client against `api_base` (no trailing slash needed).
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        api_base: &str,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Full endpoint URL for `model`.
    pub fn endpoint(&self, model: Model) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base,
            model.model_id()
        )
    }

    /// Sends `parts` and returns the decoded bytes of the first image.
    pub async fn generate(
        &self,
        parts: &[Part],
        options: &GenerationOptions,
    ) -> Result<Vec<u8>, NanoBananaError> {
        let endpoint = self.endpoint(options.model);
        debug!("POST {} with {} part(s)", endpoint, parts.len());

        let resp = self
            .client
            .post(&endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(API_TIMEOUT)
            .json(&request_body(parts, options))
            .send()
            .await
            .map_err(|err| NanoBananaError::network("calling Gemini", err))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| NanoBananaError::network("reading Gemini response", err))?;

        if !status.is_success() {
            return Err(NanoBananaError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }

        extract_first_image(&bytes)
    }
}

/// Shared HTTP client with our User-Agent.
pub fn http_client() -> Result<reqwest::Client, NanoBananaError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|err| NanoBananaError::network("building HTTP client", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> GenerationOptions {
        GenerationOptions {
            aspect: "16:9".to_string(),
            size: None,
            use_search: false,
            model: Model::Pro,
        }
    }

    #[test]
    fn body_without_optional_bits() {
        let body = request_body(&[Part::text("a goat")], &options());
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [{"text": "a goat"}]}],
                "generationConfig": {
                    "responseModalities": ["TEXT", "IMAGE"],
                    "imageConfig": {"aspectRatio": "16:9"}
                }
            })
        );
    }

    #[test]
    fn body_with_size_search_and_image() {
        let mut opts = options();
        opts.size = Some(ImageSize::FourK);
        opts.use_search = true;
        let parts = [
            Part::text("edit this"),
            ImagePart::from_bytes("image/jpeg", b"abc").into(),
        ];
        let body = request_body(&parts, &opts);
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "4K");
        assert_eq!(body["tools"], json!([{"google_search": {}}]));
        assert_eq!(
            body["contents"][0]["parts"][1],
            json!({"inline_data": {"mime_type": "image/jpeg", "data": "YWJj"}})
        );
    }

    #[test]
    fn first_inline_image_of_first_candidate_wins() {
        let body = json!({
            "candidates": [
                {"content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": ""}},
                    {"inlineData": {"mimeType": "image/png", "data": "Zmlyc3Q="}},
                    {"inlineData": {"mimeType": "image/png", "data": "c2Vjb25k"}}
                ]}},
                {"content": {"parts": [{"inlineData": {"data": "b3RoZXI="}}]}}
            ]
        });
        let bytes = extract_first_image(body.to_string().as_bytes()).expect("image");
        assert_eq!(bytes, b"first");
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let body = json!({"candidates": [{"content": {"parts": [
            {"inline_data": {"mime_type": "image/png", "data": "cG5n"}}
        ]}}]});
        assert_eq!(
            extract_first_image(body.to_string().as_bytes()).expect("image"),
            b"png"
        );
    }

    #[test]
    fn no_image_is_an_error() {
        for body in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{"content": {"parts": [{"text": "sorry"}]}}]}),
            json!({"candidates": [{"finishReason": "SAFETY"}]}),
        ] {
            assert!(matches!(
                extract_first_image(body.to_string().as_bytes()),
                Err(NanoBananaError::NoImage)
            ));
        }
        assert!(matches!(
            extract_first_image(b"<html>"),
            Err(NanoBananaError::InvalidResponse(_))
        ));
    }

    #[test]
    fn endpoint_per_model() {
        let client = GeminiClient::new(reqwest::Client::new(), "k", "http://localhost:1/");
        assert_eq!(
            client.endpoint(Model::Flash),
            "http://localhost:1/v1beta/models/gemini-2.0-flash-preview-image-generation:generateContent"
        );
    }

    #[test]
    fn local_file_mime_from_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photo.JPG");
        std::fs::write(&path, b"jpeg").expect("write");
        let part = ImagePart::from_file(&path).expect("part");
        assert_eq!(part.mime_type, "image/jpeg");
        assert_eq!(part.data, "anBlZw==");

        assert!(matches!(
            ImagePart::from_file(&dir.path().join("missing.png")),
            Err(NanoBananaError::NotFound(_))
        ));
    }
}
