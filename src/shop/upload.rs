//! Product and variation image upload to the hosted image service.

use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

use super::api_types::ApiUploadResponse;
use super::error::ApiError;
use crate::config::UploadConfig;

/// Client for an unsigned multipart upload endpoint (Cloudinary style).
#[derive(Clone)]
pub struct ImageUploader {
  http: reqwest::Client,
  url: url::Url,
  preset: String,
}

impl ImageUploader {
  pub fn new(config: &UploadConfig) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(120))
      .build()?;

    Ok(Self {
      http,
      url: config.url.clone(),
      preset: config.preset.clone(),
    })
  }

  /// Upload a local image file and return its hosted URL.
  pub async fn upload(&self, path: &Path) -> Result<String, ApiError> {
    let bytes = tokio::fs::read(path)
      .await
      .map_err(|e| ApiError::InvalidRequest(format!("cannot read {}: {}", path.display(), e)))?;

    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "image".to_string());

    tracing::info!(file = %file_name, size = bytes.len(), "uploading image");

    let form = Form::new()
      .text("upload_preset", self.preset.clone())
      .part("file", Part::bytes(bytes).file_name(file_name));

    let response = self
      .http
      .post(self.url.clone())
      .multipart(form)
      .send()
      .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
      return Err(ApiError::Backend {
        status: status.as_u16(),
        message: upload_error_message(&body).unwrap_or_else(|| "image upload failed".to_string()),
      });
    }

    let parsed: ApiUploadResponse =
      serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: self.url.to_string(),
        source,
      })?;

    hosted_url(parsed).ok_or_else(|| ApiError::MissingField {
      endpoint: self.url.to_string(),
      field: "secure_url",
    })
  }
}

fn hosted_url(response: ApiUploadResponse) -> Option<String> {
  response.secure_url.or(response.url)
}

/// Upload services nest the message as `{"error": {"message": ...}}`.
fn upload_error_message(body: &str) -> Option<String> {
  let value: serde_json::Value = serde_json::from_str(body).ok()?;
  value
    .pointer("/error/message")
    .or_else(|| value.get("message"))
    .and_then(|m| m.as_str())
    .map(String::from)
}
