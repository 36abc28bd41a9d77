//! Image encoding: file on disk → base64 [`ImageData`].
//!
//! Vision APIs accept images as base64 data-URIs embedded in the JSON
//! request body. The artifacts this pipeline produces are already
//! compressed (JPEG page renders, JPEG enhancement output), so the bytes
//! are shipped as-is rather than re-encoded. `detail: "high"` instructs
//! GPT-4-class models to spend the full image tile budget; without it fine
//! print in tax tables and bank details is lost.

use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A base64-encoded image ready to inline in a multimodal request.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Base64 payload (standard alphabet, padded).
    pub data: String,
    /// MIME type of the encoded bytes.
    pub mime_type: &'static str,
    /// Detail level hint for the vision API (`"high"`, `"low"`, `"auto"`).
    pub detail: &'static str,
}

impl ImageData {
    pub fn new(data: String, mime_type: &'static str) -> Self {
        Self {
            data,
            mime_type,
            detail: "auto",
        }
    }

    pub fn with_detail(mut self, detail: &'static str) -> Self {
        self.detail = detail;
        self
    }

    /// The `data:` URI form expected by `image_url` content parts.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Read an image artifact and wrap it for the vision API request.
pub fn encode_image_file(path: &Path) -> Result<ImageData, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::Internal(format!("Failed to read image '{}': {e}", path.display()))
        }
    })?;

    let b64 = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} → {} bytes base64",
        path.display(),
        b64.len()
    );

    Ok(ImageData::new(b64, mime_for(path)).with_detail("high"))
}

/// Pick the MIME type from the file extension; the pipeline only ever
/// produces JPEG and PNG artifacts.
fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn encodes_existing_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.jpg");
        GrayImage::from_pixel(8, 8, Luma([128])).save(&path).unwrap();

        let data = encode_image_file(&path).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(data.detail, "high");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(!decoded.is_empty());
    }

    #[test]
    fn missing_file_is_a_not_found_error() {
        let err = encode_image_file(Path::new("/nonexistent/page.png")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.png")), "image/png");
        assert_eq!(mime_for(Path::new("a")), "image/png");
    }

    #[test]
    fn data_url_embeds_mime_and_payload() {
        let data = ImageData::new("QUJD".to_string(), "image/png");
        assert_eq!(data.to_data_url(), "data:image/png;base64,QUJD");
    }
}
