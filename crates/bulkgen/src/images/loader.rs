//! Builds an image pool from a directory on disk.
//!
//! The upload collaborator normally hands the pipeline a ready pool; this
//! loader covers the command-line path where images sit in a folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BulkgenError, ConfigError};
use crate::sanitize;

use super::pool::{ImagePool, PoolImage};

/// Sidecar files mapping image file names to alt text.
const ALT_TEXT_SIDECARS: &[&str] = &["alt.json", "alt.yaml", "alt.yml"];

/// Loads every `image/*` file directly inside `dir`, in file-name order.
///
/// Alt text is read from an optional `alt.json` / `alt.yaml` sidecar.
pub fn load_image_dir(dir: &Path, max_images: usize) -> Result<ImagePool, BulkgenError> {
    let alt_texts = load_alt_texts(dir)?;

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in image directory: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_image(path))
        .collect();
    paths.sort();

    let images = paths.into_iter().map(|path| {
        let name = sanitize::redact_path(&path);
        let mut image = PoolImage::new(
            uuid::Uuid::new_v4().to_string(),
            path.display().to_string(),
            name.clone(),
        );
        if let Some(alt) = alt_texts.get(&name) {
            image = image.with_alt_text(alt.clone());
        }
        debug!("Loaded pool image '{}'", name);
        image
    });

    Ok(ImagePool::from_images(images, max_images)?)
}

fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

fn load_alt_texts(dir: &Path) -> Result<HashMap<String, String>, BulkgenError> {
    for name in ALT_TEXT_SIDECARS {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let map = if name.ends_with(".json") {
            serde_json::from_str(&content).map_err(ConfigError::from)?
        } else {
            serde_yaml::from_str(&content).map_err(ConfigError::from)?
        };
        return Ok(map);
    }
    Ok(HashMap::new())
}
