//! Profile picture uploads through Cloudinary's unsigned upload API.

use crate::config::{CloudinaryConfig, HttpConfig};
use crate::error::{Result, SessionError};
use crate::providers::ImageHost;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: String,
}

/// [`ImageHost`] backed by Cloudinary.
#[derive(Debug, Clone)]
pub struct CloudinaryImageHost {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryImageHost {
    /// Create a host for the configured cloud.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the HTTP client cannot be built.
    pub fn new(config: CloudinaryConfig, http: &HttpConfig) -> Result<Self> {
        let client = http
            .client()
            .map_err(|e| SessionError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a host around an existing HTTP client.
    #[must_use]
    pub const fn with_client(config: CloudinaryConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }
}

/// MIME type guessed from the file extension.
fn mime_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

impl ImageHost for CloudinaryImageHost {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type(file_name))
            .map_err(|e| SessionError::storage(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("cloud_name", self.config.cloud_name.clone());

        let response = self
            .http
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SessionError::storage(format!("Image upload failed: {e}")))?;

        let status = response.status();
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| SessionError::storage(format!("Malformed upload response ({status}): {e}")))?;

        match (status.is_success(), body.secure_url, body.error) {
            (true, Some(url), _) => {
                tracing::info!(%url, "Image uploaded");
                Ok(url)
            },
            (_, _, Some(error)) => Err(SessionError::storage(error.message)),
            _ => Err(SessionError::storage(format!(
                "Image upload failed with HTTP {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(mime_type("avatar.PNG"), "image/png");
        assert_eq!(mime_type("avatar.jpg"), "image/jpeg");
        assert_eq!(mime_type("avatar"), "image/jpeg");
    }
}
