//! Error handling

use std::path::PathBuf;

/// Exit code used when no API key could be found.
pub const EXIT_MISSING_API_KEY: u8 = 2;

/// Exit code for every other fatal error.
pub const EXIT_FAILURE: u8 = 1;

/// Errors for the nanobanana tools.
#[derive(Debug)]
pub enum NanoBananaError {
    /// No API key in the settings file, environment or `.env` files
    MissingApiKey,
    /// Transport-level failure (DNS, connect, timeout, body read)
    Network {
        /// What we were doing at the time
        context: String,
        /// Underlying client error
        source: reqwest::Error,
    },
    /// The Gemini API answered with a non-2xx status
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, lossily decoded
        body: String,
    },
    /// A plain GET answered with a non-2xx status
    HttpStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },
    /// A download went over its byte cap
    TooLarge {
        /// Requested URL
        url: String,
        /// The cap that was exceeded
        max_bytes: usize,
    },
    /// The API response had no inline image in its first candidate
    NoImage,
    /// The API response was not the JSON we expected
    InvalidResponse(serde_json::Error),
    /// Inline image data was not valid base64
    Decode(base64::DecodeError),
    /// Filesystem failure on a specific path
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// A source file does not exist
    NotFound(PathBuf),
    /// The resize backend failed
    Backend(String),
    /// The raster backend failed to decode or encode
    Image(image::ImageError),
}

impl NanoBananaError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a client error with a short description of the request.
    pub fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingApiKey => EXIT_MISSING_API_KEY,
            _ => EXIT_FAILURE,
        }
    }
}

impl std::fmt::Display for NanoBananaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(
                f,
                "Missing GEMINI_API_KEY (settings file, env, .env, or ~/.env)"
            ),
            Self::Network { context, source } => write!(f, "Network error {context}: {source}"),
            Self::Api { status, body } => write!(
                f,
                "Gemini API error {status}: {}",
                body.split_whitespace().collect::<Vec<_>>().join(" ")
            ),
            Self::HttpStatus { url, status } => write!(f, "GET {url} returned {status}"),
            Self::TooLarge { url, max_bytes } => {
                write!(f, "Downloaded content exceeds {max_bytes} bytes for {url}")
            }
            Self::NoImage => write!(f, "No image returned (missing inlineData)"),
            Self::InvalidResponse(err) => write!(f, "Failed to parse Gemini response: {err}"),
            Self::Decode(err) => write!(f, "Failed to base64-decode image: {err}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::NotFound(path) => write!(f, "File not found: {}", path.display()),
            Self::Backend(message) => write!(f, "Resize backend failed: {message}"),
            Self::Image(err) => write!(f, "Image processing failed: {err}"),
        }
    }
}

impl std::error::Error for NanoBananaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network { source, .. } => Some(source),
            Self::InvalidResponse(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Image(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for NanoBananaError {
    fn from(err: serde_json::Error) -> Self {
        NanoBananaError::InvalidResponse(err)
    }
}

impl From<base64::DecodeError> for NanoBananaError {
    fn from(err: base64::DecodeError) -> Self {
        NanoBananaError::Decode(err)
    }
}

impl From<image::ImageError> for NanoBananaError {
    fn from(err: image::ImageError) -> Self {
        NanoBananaError::Image(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_has_its_own_exit_code() {
        assert_eq!(NanoBananaError::MissingApiKey.exit_code(), 2);
        assert_eq!(NanoBananaError::NoImage.exit_code(), 1);
        assert_eq!(
            NanoBananaError::NotFound(PathBuf::from("x.png")).exit_code(),
            1
        );
    }

    #[test]
    fn messages_are_single_line() {
        let err = NanoBananaError::Api {
            status: 400,
            body: "bad request".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini API error 400: bad request");
        let err = NanoBananaError::Api {
            status: 400,
            body: "{\n  \"error\": {\n    \"code\": 400,\n    \"status\": \"INVALID_ARGUMENT\"\n  }\n}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"Gemini API error 400: { "error": { "code": 400, "status": "INVALID_ARGUMENT" } }"#
        );
        assert_eq!(
            NanoBananaError::NotFound(PathBuf::from("cat.png")).to_string(),
            "File not found: cat.png"
        );
    }
}
