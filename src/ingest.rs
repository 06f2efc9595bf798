//! Reference image ingestion.

use crate::error::{ArchitectError, Result};
use crate::image::UploadedImage;
use std::path::{Path, PathBuf};

/// Maximum number of reference images held at once.
pub const MAX_REFERENCE_IMAGES: usize = 10;

/// A file that could not be turned into an image.
#[derive(Debug)]
pub struct IngestFailure {
    /// The file that failed.
    pub path: PathBuf,
    /// Why it failed.
    pub error: ArchitectError,
}

/// Outcome of one accepted batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Identifiers of the images added, in input order.
    pub added: Vec<String>,
    /// Files that were dropped.
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Returns true when every file in the batch was added.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The current set of reference images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSet {
    images: Vec<UploadedImage>,
}

impl UploadSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from existing images, e.g. a restored history entry.
    pub fn from_images(images: Vec<UploadedImage>) -> Self {
        Self { images }
    }

    /// Returns the images in upload order.
    pub fn images(&self) -> &[UploadedImage] {
        &self.images
    }

    /// Consumes the set, returning its images.
    pub fn into_images(self) -> Vec<UploadedImage> {
        self.images
    }

    /// Returns the number of images held.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true when no images are held.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Returns how many more images fit.
    pub fn remaining(&self) -> usize {
        MAX_REFERENCE_IMAGES.saturating_sub(self.images.len())
    }

    /// Removes the image with `id`. Returns whether one was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id != id);
        self.images.len() != before
    }

    /// Removes every image.
    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Checks that `incoming` more images fit, without changing the set.
    pub fn check_capacity(&self, incoming: usize) -> Result<()> {
        if self.images.len() + incoming > MAX_REFERENCE_IMAGES {
            return Err(ArchitectError::TooManyImages {
                held: self.images.len(),
                incoming,
                max: MAX_REFERENCE_IMAGES,
            });
        }
        Ok(())
    }

    /// Adds already decoded images as one batch, all or nothing.
    pub fn extend(&mut self, images: Vec<UploadedImage>) -> Result<()> {
        self.check_capacity(images.len())?;
        self.images.extend(images);
        Ok(())
    }

    /// Reads and encodes a batch of image files.
    ///
    /// If the batch would exceed [`MAX_REFERENCE_IMAGES`] nothing is read and
    /// nothing is added. Otherwise all files are read concurrently and the
    /// set is updated once, after the last read settles, in input order.
    /// Files that fail are left out and listed in the report.
    pub async fn ingest_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<IngestReport> {
        self.check_capacity(paths.len())?;
        if paths.is_empty() {
            return Ok(IngestReport::default());
        }

        let results = futures::future::join_all(paths.iter().map(|p| load_image(p.as_ref()))).await;

        let mut report = IngestReport::default();
        let mut accepted = Vec::with_capacity(results.len());
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(image) => {
                    report.added.push(image.id.clone());
                    accepted.push(image);
                }
                Err(error) => {
                    tracing::warn!(path = %path.as_ref().display(), "dropping image: {error}");
                    report.failures.push(IngestFailure {
                        path: path.as_ref().to_path_buf(),
                        error,
                    });
                }
            }
        }

        self.images.extend(accepted);
        tracing::debug!(
            added = report.added.len(),
            failed = report.failures.len(),
            held = self.images.len(),
            "ingested image batch"
        );
        Ok(report)
    }
}

/// Reads one image file and encodes it as a data URL.
pub async fn load_image(path: &Path) -> Result<UploadedImage> {
    let data = tokio::fs::read(path).await?;
    let name = path.file_name().and_then(|n| n.to_str());
    UploadedImage::from_bytes(&data, name)
}
