use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::matcher::tokens::fingerprint_tokens;

/// An uploaded image available for automatic placement.
///
/// The bytes stay with the upload subsystem; `file_ref` is whatever handle
/// that subsystem hands out (a path, a URL, an object key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolImage {
    pub id: String,
    pub file_ref: String,
    pub original_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl PoolImage {
    pub fn new(
        id: impl Into<String>,
        file_ref: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file_ref: file_ref.into(),
            original_name: original_name.into(),
            alt_text: None,
        }
    }

    pub fn with_alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(alt_text.into());
        self
    }
}

/// A pool image paired with its pre-computed text fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintedImage {
    pub image: PoolImage,
    pub tokens: HashSet<String>,
}

/// Bounded, insertion-ordered set of images for one bulk job.
///
/// Shared read-only (behind an `Arc`) by every worker while a job runs.
#[derive(Debug, Clone)]
pub struct ImagePool {
    images: Vec<FingerprintedImage>,
    max_images: usize,
}

impl ImagePool {
    pub fn new(max_images: usize) -> Self {
        Self {
            images: Vec::new(),
            max_images,
        }
    }

    /// Builds a pool from a full upload, rejecting it if it exceeds the bound.
    pub fn from_images(
        images: impl IntoIterator<Item = PoolImage>,
        max_images: usize,
    ) -> Result<Self, ValidationError> {
        let images: Vec<PoolImage> = images.into_iter().collect();
        if images.len() > max_images {
            return Err(ValidationError::TooManyImages {
                count: images.len(),
                max: max_images,
            });
        }

        let mut pool = Self::new(max_images);
        for image in images {
            pool.add(image)?;
        }
        Ok(pool)
    }

    /// Appends an image. Later insertions lose similarity ties.
    pub fn add(&mut self, image: PoolImage) -> Result<(), ValidationError> {
        if self.images.len() >= self.max_images {
            return Err(ValidationError::TooManyImages {
                count: self.images.len() + 1,
                max: self.max_images,
            });
        }
        if self.images.iter().any(|f| f.image.id == image.id) {
            return Err(ValidationError::DuplicateImage(image.id));
        }

        let tokens = fingerprint_tokens(&image.original_name, image.alt_text.as_deref());
        self.images.push(FingerprintedImage { image, tokens });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FingerprintedImage> {
        self.images.iter()
    }

    pub fn get(&self, id: &str) -> Option<&PoolImage> {
        self.images
            .iter()
            .find(|f| f.image.id == id)
            .map(|f| &f.image)
    }
}
