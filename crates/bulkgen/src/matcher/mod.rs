//! Automatic placement of pool images under generated sub-headings.

pub mod image_matcher;
pub mod tokens;

pub use image_matcher::{ImageMatch, ImageMatcher, DEFAULT_MIN_SIMILARITY};
