use std::path::Path;

use rand::Rng;

/// MIME types the service accepts for upload.
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/webp",
];

/// Bounds enforced on the upload set before any network traffic.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    /// Fewest files a submission may carry.
    pub min_files: usize,
    /// Hard ceiling on the number of files.
    pub max_files: usize,
    /// Per-file byte ceiling.
    pub max_file_bytes: u64,
    /// Aggregate byte ceiling across the whole set.
    pub max_total_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            min_files: 2,
            max_files: 100,
            max_file_bytes: 10 * 1024 * 1024,
            max_total_bytes: 500 * 1024 * 1024,
        }
    }
}

impl UploadLimits {
    /// Override the file-count ceiling.
    pub fn with_max_files(mut self, max: usize) -> Self {
        self.max_files = max;
        self
    }
}

/// Validation failures raised before any network call.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("At least {min} images are required, have {have}")]
    TooFewFiles { min: usize, have: usize },

    #[error("Cannot exceed {max} images")]
    TooManyFiles { max: usize },

    #[error("{name} is {size} bytes, over the {max} byte per-file limit")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Total upload size would exceed {max} bytes")]
    TotalTooLarge { max: u64 },

    #[error("{name}: unsupported type {mime}")]
    UnsupportedType { name: String, mime: String },

    #[error("Failed to read {0}")]
    Read(String),

    #[error("No file with id {0}")]
    NotFound(String),
}

/// A transient, revocable handle to a locally-rendered preview.
///
/// The release closure runs exactly once: on explicit [`revoke`](Self::revoke)
/// (file removal, set truncation, session reset) or, as a safety net, on
/// drop.
pub struct PreviewHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl PreviewHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the preview resource. A second call is a no-op.
    pub fn revoke(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

/// A user-selected image pending submission.
#[derive(Debug)]
pub struct UploadedFile {
    /// Client-generated token: sanitized name + epoch millis + random hex.
    /// Best-effort unique within a session, not cryptographic.
    pub id: String,
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub preview: Option<PreviewHandle>,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn generate_file_id(name: &str) -> String {
    let stem: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect();
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::rng().random();
    format!("{}-{}-{:08x}", stem, millis, nonce)
}

/// The set of images staged for the next submission.
///
/// All count/size/type invariants live here so that every mutation path
/// (manual add/remove, advisor truncation, reset) goes through the same
/// checks. A rejected add leaves the set untouched.
///
/// # Example
/// ```
/// use collage_client::{UploadLimits, UploadSet};
///
/// let mut uploads = UploadSet::new(UploadLimits::default());
/// uploads.add("a.jpg", "image/jpeg", vec![0xFF, 0xD8]).unwrap();
/// uploads.add("b.png", "image/png", vec![0x89, 0x50]).unwrap();
/// assert!(uploads.ensure_submittable().is_ok());
/// ```
#[derive(Debug)]
pub struct UploadSet {
    files: Vec<UploadedFile>,
    limits: UploadLimits,
}

impl UploadSet {
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            files: Vec::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size()).sum()
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// Stage a file. Returns its generated id.
    ///
    /// Rejects unsupported types and any add that would break the count,
    /// per-file, or aggregate ceilings; the existing set is unchanged on
    /// rejection.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError> {
        let name = name.into();
        let mime = mime.into();

        if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(UploadError::UnsupportedType { name, mime });
        }
        if self.files.len() + 1 > self.limits.max_files {
            return Err(UploadError::TooManyFiles {
                max: self.limits.max_files,
            });
        }
        let size = bytes.len() as u64;
        if size > self.limits.max_file_bytes {
            return Err(UploadError::FileTooLarge {
                name,
                size,
                max: self.limits.max_file_bytes,
            });
        }
        if self.total_bytes() + size > self.limits.max_total_bytes {
            return Err(UploadError::TotalTooLarge {
                max: self.limits.max_total_bytes,
            });
        }

        let id = generate_file_id(&name);
        self.files.push(UploadedFile {
            id: id.clone(),
            name,
            mime,
            bytes,
            preview: None,
        });
        Ok(id)
    }

    /// Stage a file from disk, inferring its MIME type from the extension.
    pub fn add_from_path(&mut self, path: impl AsRef<Path>) -> Result<String, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = std::fs::read(path)
            .map_err(|e| UploadError::Read(format!("{}: {}", path.display(), e)))?;
        self.add(name, mime, bytes)
    }

    /// Attach a preview handle to a staged file.
    pub fn set_preview(&mut self, id: &str, preview: PreviewHandle) -> Result<(), UploadError> {
        let file = self
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;
        if let Some(mut old) = file.preview.replace(preview) {
            old.revoke();
        }
        Ok(())
    }

    /// Remove a staged file by id, revoking its preview.
    pub fn remove(&mut self, id: &str) -> Result<UploadedFile, UploadError> {
        let pos = self
            .files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;
        let mut file = self.files.remove(pos);
        if let Some(preview) = file.preview.as_mut() {
            preview.revoke();
        }
        Ok(file)
    }

    /// Keep the first `keep` files in order, dropping the tail and
    /// revoking dropped previews. Used by the grid-advisor remove action.
    pub fn truncate(&mut self, keep: usize) {
        for file in self.files.iter_mut().skip(keep) {
            if let Some(preview) = file.preview.as_mut() {
                preview.revoke();
            }
        }
        self.files.truncate(keep);
    }

    /// Drop every staged file, revoking all previews.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Check the set is valid for submission (enough files present).
    /// The per-add checks already hold the upper bounds.
    pub fn ensure_submittable(&self) -> Result<(), UploadError> {
        if self.files.len() < self.limits.min_files {
            return Err(UploadError::TooFewFiles {
                min: self.limits.min_files,
                have: self.files.len(),
            });
        }
        Ok(())
    }
}
