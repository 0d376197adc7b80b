use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_EXTENSIONS, RECIPE_IMAGE_DIR},
    error::{ApiError, ValidationErrors},
};

/*
Recipe images arrive inline as data URIs:

data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABAQMAAAAl21bKAAAAA1BMVEUAAACnej3aAAAAAXRSTlMAQObYZgAAAApJREFUCNdjYAAAAAIAAeIhvDMAAAAASUVORK5CYII=

They are stored under <media root>/recipes/images/<uuid>.<ext> and the database keeps the
path relative to the media root.
*/

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(data: &str) -> Result<DecodedImage, String> {
    let (header, payload) = data
        .split_once(',')
        .ok_or_else(|| "Upload a valid image encoded as a data URI.".to_owned())?;

    let media_type = header
        .strip_prefix("data:")
        .and_then(|h| h.strip_suffix(";base64"))
        .ok_or_else(|| "Upload a valid image encoded as a data URI.".to_owned())?;

    let extension = media_type
        .strip_prefix("image/")
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| format!("Unsupported image type: {media_type}"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_e| "Image payload is not valid base64.".to_owned())?;
    if bytes.is_empty() {
        return Err("The submitted image is empty.".to_owned());
    }

    let extension = if extension == "jpeg" { "jpg".to_owned() } else { extension };
    Ok(DecodedImage { extension, bytes })
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let url = if url.ends_with('/') {
            url.to_owned()
        } else {
            format!("{url}/")
        };

        Self {
            root: root.into(),
            url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        format!("{}{}", self.url, path)
    }

    /// Decodes and writes a recipe image, returning its path relative to the media root.
    pub async fn save_recipe_image(&self, data: &str) -> Result<String, ApiError> {
        let image =
            decode_data_uri(data).map_err(|e| ApiError::from(ValidationErrors::single("image", &e)))?;

        let relative = format!("{RECIPE_IMAGE_DIR}/{}.{}", uuid::Uuid::new_v4(), image.extension);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to create media directory: {e}")))?;
        }
        tokio::fs::write(&target, &image.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to store image: {e}")))?;

        log::debug!("Stored recipe image {relative} ({} bytes)", image.bytes.len());
        Ok(relative)
    }

    /// Best effort; a missing file is not an error.
    pub async fn remove(&self, path: &str) {
        if path.is_empty() || path.contains("..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(path)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove media file {path}: {e}");
            }
        }
    }
}
