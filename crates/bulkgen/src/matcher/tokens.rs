//! Word tokenization shared by headings and image fingerprints.

use std::collections::HashSet;

/// File extensions stripped from image names before tokenizing.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "svg", "heic", "avif",
];

/// Words that carry no topical signal in headings or file names.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "into", "is",
    "it", "its", "of", "on", "or", "our", "the", "their", "this", "to", "what", "when", "why",
    "with", "your", "you", "vs", "about", "best", "top", "guide", "tips", "ways",
    // Camera and upload noise.
    "img", "image", "images", "photo", "pic", "picture", "dsc", "dscn", "screenshot", "copy",
    "final", "edit", "edited", "new", "untitled",
];

/// Lower-cased, de-duplicated word tokens of `text`.
///
/// Splits on anything that is not alphanumeric, then drops stop words,
/// pure numbers and single characters.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Fingerprint for a pool image: tokens of its file name (extension
/// removed) plus its alt text.
pub fn fingerprint_tokens(original_name: &str, alt_text: Option<&str>) -> HashSet<String> {
    let stem = strip_image_extension(original_name);
    let mut tokens = tokenize(stem);
    if let Some(alt) = alt_text {
        tokens.extend(tokenize(alt));
    }
    tokens
}

fn strip_image_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => stem,
        _ => name,
    }
}

/// Ochiai (set cosine) similarity in `[0, 1]`.
pub fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    shared / ((a.len() * b.len()) as f64).sqrt()
}
