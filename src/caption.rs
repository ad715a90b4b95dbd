//! AI caption service client.
//!
//! The service takes a PNG and returns generated text. Two endpoints exist:
//!
//! | Kind | Endpoint | Response field |
//! |---|---|---|
//! | [`CaptionKind::Caption`] | `POST {base}/caption` | `caption` |
//! | [`CaptionKind::Post`] | `POST {base}/instagram` | `instagram_caption` |
//!
//! The image is sent as multipart field `image` named `image.png`. Every
//! failure maps onto a [`CaptionError`] whose message is meant to be shown to
//! the user as-is.

use reqwest::blocking::{Client, multipart};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("Please add an image to generate a caption")]
    NoImage,
    #[error("Failed to export image. Please try again.")]
    ExportFailed,
    #[error("API request failed: {0}")]
    Request(String),
    #[error("Failed to reach caption service: {0}")]
    Network(#[from] reqwest::Error),
    #[error("No text was generated. Please try again.")]
    EmptyText,
    #[error("Caption service returned invalid JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptionKind {
    /// A short descriptive caption.
    #[default]
    Caption,
    /// A social media post with hashtags.
    Post,
}

impl CaptionKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            CaptionKind::Caption => "caption",
            CaptionKind::Post => "instagram",
        }
    }

    pub fn response_field(self) -> &'static str {
        match self {
            CaptionKind::Caption => "caption",
            CaptionKind::Post => "instagram_caption",
        }
    }
}

/// Anything that turns PNG bytes into generated text.
pub trait CaptionService {
    fn generate(&self, kind: CaptionKind, png: &[u8]) -> Result<String, CaptionError>;
}

/// Blocking HTTP client for the caption service.
pub struct HttpCaptionService {
    client: Client,
    base_url: String,
}

impl HttpCaptionService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CaptionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, kind: CaptionKind) -> String {
        format!("{}/{}", self.base_url, kind.endpoint())
    }
}

impl CaptionService for HttpCaptionService {
    fn generate(&self, kind: CaptionKind, png: &[u8]) -> Result<String, CaptionError> {
        let url = self.url_for(kind);
        log::info!("requesting {} ({} bytes)", url, png.len());
        let form = multipart::Form::new().part(
            "image",
            multipart::Part::bytes(png.to_vec())
                .file_name("image.png")
                .mime_str("image/png")?,
        );
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()?;
        let success = response.status().is_success();
        let body = response.text()?;
        if !success {
            log::warn!("caption service error from {url}: {body}");
        }
        parse_caption_response(kind, success, &body)
    }
}

/// Turn a service response into the generated text.
pub fn parse_caption_response(
    kind: CaptionKind,
    success: bool,
    body: &str,
) -> Result<String, CaptionError> {
    if !success {
        return Err(CaptionError::Request(body.to_string()));
    }
    let value: Value = serde_json::from_str(body)?;
    value
        .get(kind.response_field())
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(CaptionError::EmptyText)
}
