use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::generator::{EnrichedArticle, GeneratedArticle, PlacedImage};
use crate::images::ImagePool;

use super::tokens::{similarity, tokenize};

/// Default minimum similarity for an image to be placed under a heading.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.2;

/// An image chosen for one sub-heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMatch {
    pub image_id: String,
    pub score: f64,
}

/// Assigns pool images to sub-headings by token overlap.
///
/// Each call is an independent pass: an image is placed at most once per
/// call, but the same pool can be matched again for the next article.
#[derive(Debug, Clone, Copy)]
pub struct ImageMatcher {
    min_similarity: f64,
}

impl Default for ImageMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIMILARITY)
    }
}

impl ImageMatcher {
    pub fn new(min_similarity: f64) -> Self {
        Self { min_similarity }
    }

    /// Returns one slot per sub-heading, index-aligned with `sub_headings`.
    ///
    /// Headings are served in order; each takes the best-scoring image not yet
    /// used in this pass, provided it clears the threshold. Ties go to the
    /// image inserted into the pool first.
    pub fn assign<S: AsRef<str>>(
        &self,
        sub_headings: &[S],
        pool: &ImagePool,
    ) -> Vec<Option<ImageMatch>> {
        let mut used = vec![false; pool.len()];

        sub_headings
            .iter()
            .map(|heading| {
                let heading = heading.as_ref();
                let heading_tokens = tokenize(heading);
                let mut best: Option<(usize, f64)> = None;

                for (i, candidate) in pool.iter().enumerate() {
                    if used[i] {
                        continue;
                    }
                    let score = similarity(&heading_tokens, &candidate.tokens);
                    if score <= 0.0 || score < self.min_similarity {
                        continue;
                    }
                    // Strict comparison keeps the earliest image on ties.
                    if best.map_or(true, |(_, top)| score > top) {
                        best = Some((i, score));
                    }
                }

                best.and_then(|(i, score)| {
                    used[i] = true;
                    pool.iter().nth(i).map(|candidate| {
                        trace!(
                            heading,
                            image_id = %candidate.image.id,
                            score,
                            "matched image to heading"
                        );
                        ImageMatch {
                            image_id: candidate.image.id.clone(),
                            score,
                        }
                    })
                })
            })
            .collect()
    }

    /// Places pool images under the article's sections.
    pub fn enrich(&self, article: GeneratedArticle, pool: &ImagePool) -> EnrichedArticle {
        let matches = self.assign(&article.sub_headings(), pool);
        let placements = matches
            .into_iter()
            .map(|m| {
                m.and_then(|m| {
                    pool.get(&m.image_id).map(|image| PlacedImage {
                        image_id: image.id.clone(),
                        file_ref: image.file_ref.clone(),
                        alt_text: image.alt_text.clone(),
                        score: m.score,
                    })
                })
            })
            .collect();
        EnrichedArticle::with_placements(article, placements)
    }
}
