//! Uploaded image pool used for automatic placement into articles.

pub mod loader;
pub mod pool;

pub use loader::load_image_dir;
pub use pool::{FingerprintedImage, ImagePool, PoolImage};
