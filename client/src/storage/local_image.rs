use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ImageSource;

const MAX_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not an image file: {0}")]
    InvalidFormat(String),
    #[error("File too large: {0} bytes (limit is 50 MiB)")]
    FileTooLarge(usize),
    #[error("File is empty: {0}")]
    Empty(String),
}

/// A photograph read from disk and ready to be staged for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl LocalImage {
    pub fn load(path: &Path) -> Result<Self, ImageError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ImageError::InvalidFormat(path.display().to_string()))?;
        let mime_type = mime_type_for(path)?.to_string();

        let bytes = fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        validate_image_size(&bytes)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty(file_name));
        }

        log::debug!(
            "Loaded {} ({}, {} bytes, sha256 {})",
            file_name,
            mime_type,
            bytes.len(),
            calculate_image_hash(&bytes)
        );
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    /// Short content-derived name used for output artifacts.
    pub fn fingerprint(&self) -> String {
        calculate_image_hash(&self.bytes)[..12].to_string()
    }
}

impl From<LocalImage> for ImageSource {
    fn from(image: LocalImage) -> Self {
        ImageSource::Upload {
            file_name: image.file_name,
            mime_type: image.mime_type,
            bytes: image.bytes,
        }
    }
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

pub fn mime_type_for(path: &Path) -> Result<&'static str, ImageError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        "gif" => Ok("image/gif"),
        "bmp" => Ok("image/bmp"),
        _ => Err(ImageError::InvalidFormat(path.display().to_string())),
    }
}

pub fn validate_image_size(image_data: &[u8]) -> Result<(), ImageError> {
    if image_data.len() > MAX_SIZE {
        return Err(ImageError::FileTooLarge(image_data.len()));
    }
    Ok(())
}

/// Writes a downloaded blob under `dir`, keeping only the final path
/// component of `name`.
pub fn save_blob(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, ImageError> {
    let file_name = Path::new(name)
        .file_name()
        .ok_or_else(|| ImageError::InvalidFormat(name.to_string()))?;
    let path = dir.join(file_name);
    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&path, bytes))
        .map_err(|source| ImageError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}
