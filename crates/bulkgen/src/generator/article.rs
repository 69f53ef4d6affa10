use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One heading and the paragraph text beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSection {
    pub heading: String,
    pub body: String,
}

impl ArticleSection {
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }
}

/// Provider output for one row, segmented into titled sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArticle {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    pub sections: Vec<ArticleSection>,
}

static RE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.+?)\s*#*\s*$").unwrap());

impl GeneratedArticle {
    pub fn new(title: impl Into<String>, sections: Vec<ArticleSection>) -> Self {
        Self {
            title: title.into(),
            intro: None,
            sections,
        }
    }

    pub fn with_intro(mut self, intro: impl Into<String>) -> Self {
        self.intro = Some(intro.into());
        self
    }

    /// Splits a markdown reply on `#` heading lines.
    ///
    /// A leading level-1 heading becomes the title (else `fallback_title` is
    /// used); text before the first section heading is the intro.
    pub fn from_markdown(fallback_title: &str, markdown: &str) -> Self {
        let mut title: Option<String> = None;
        let mut intro = String::new();
        let mut sections: Vec<ArticleSection> = Vec::new();

        for line in markdown.lines() {
            if let Some(caps) = RE_HEADING.captures(line) {
                let level = caps[1].len();
                let text = caps[2].trim().to_string();
                if level == 1 && title.is_none() && sections.is_empty() {
                    title = Some(text);
                } else {
                    sections.push(ArticleSection::new(text, String::new()));
                }
                continue;
            }

            let target = match sections.last_mut() {
                Some(section) => &mut section.body,
                None => &mut intro,
            };
            target.push_str(line);
            target.push('\n');
        }

        for section in &mut sections {
            section.body = section.body.trim().to_string();
        }
        let intro = intro.trim();

        Self {
            title: title.unwrap_or_else(|| fallback_title.to_string()),
            intro: (!intro.is_empty()).then(|| intro.to_string()),
            sections,
        }
    }

    /// Section headings in order; the input to image matching.
    pub fn sub_headings(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.heading.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.intro.is_none()
    }
}

/// An image placed under a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedImage {
    pub image_id: String,
    pub file_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedSection {
    pub heading: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PlacedImage>,
}

/// A generated article with any matched images attached. Stored as a row's
/// success payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedArticle {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    pub sections: Vec<EnrichedSection>,
}

impl EnrichedArticle {
    /// Attaches `placements`, index-aligned with the article's sections.
    /// Missing entries leave the section heading-only.
    pub fn with_placements(article: GeneratedArticle, placements: Vec<Option<PlacedImage>>) -> Self {
        let mut placements = placements.into_iter();
        let sections = article
            .sections
            .into_iter()
            .map(|section| EnrichedSection {
                heading: section.heading,
                body: section.body,
                image: placements.next().flatten(),
            })
            .collect();

        Self {
            title: article.title,
            intro: article.intro,
            sections,
        }
    }

    pub fn image_count(&self) -> usize {
        self.sections.iter().filter(|s| s.image.is_some()).count()
    }
}

impl From<GeneratedArticle> for EnrichedArticle {
    fn from(article: GeneratedArticle) -> Self {
        Self::with_placements(article, Vec::new())
    }
}
