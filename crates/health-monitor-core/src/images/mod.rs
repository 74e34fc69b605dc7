//! Content-addressed storage for visit images.
//!
//! References are `<sha256-hex>.<ext>`, so storing the same bytes twice
//! yields the same reference and writes nothing new.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Image store errors.
#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Image is empty")]
    Empty,
}

pub type ImageResult<T> = Result<T, ImageStoreError>;

/// Image store used by the visit workflow.
pub trait ImageStore {
    /// Persist bytes and return an opaque reference.
    fn store(&self, bytes: &[u8]) -> ImageResult<String>;

    fn load(&self, reference: &str) -> ImageResult<Vec<u8>>;
}

impl<T: ImageStore + ?Sized> ImageStore for &T {
    fn store(&self, bytes: &[u8]) -> ImageResult<String> {
        (**self).store(bytes)
    }

    fn load(&self, reference: &str) -> ImageResult<Vec<u8>> {
        (**self).load(reference)
    }
}

/// Image store backed by a directory.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    /// Open (and create if needed) an image directory.
    pub fn open<P: AsRef<Path>>(root: P) -> ImageResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, reference: &str) -> ImageResult<PathBuf> {
        let valid = reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
            && !reference.starts_with('.')
            && !reference.contains("..");
        if !valid {
            return Err(ImageStoreError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(reference))
    }
}

impl ImageStore for FsImageStore {
    fn store(&self, bytes: &[u8]) -> ImageResult<String> {
        if bytes.is_empty() {
            return Err(ImageStoreError::Empty);
        }

        let reference = format!("{}.{}", hash_data(bytes), sniff_extension(bytes));
        let path = self.path_for(&reference)?;
        if !path.exists() {
            fs::write(&path, bytes)?;
        }
        debug!(reference = %reference, size = bytes.len(), "Stored image");
        Ok(reference)
    }

    fn load(&self, reference: &str) -> ImageResult<Vec<u8>> {
        let path = self.path_for(reference)?;
        if !path.exists() {
            return Err(ImageStoreError::NotFound(reference.to_string()));
        }
        Ok(fs::read(path)?)
    }
}

/// Hash bytes with SHA-256, returning hex string.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File extension from the image's magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if bytes.starts_with(b"GIF8") {
        "gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "bin"
    }
}

/// MIME type for a stored reference.
pub fn mime_type_for(reference: &str) -> &'static str {
    match reference.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        // Unknown formats are sent as JPEG, the most common camera output
        _ => "image/jpeg",
    }
}
