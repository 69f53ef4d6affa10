use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Writing tone requested for an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Friendly,
    Formal,
    Persuasive,
    Informative,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Friendly => "friendly",
            Tone::Formal => "formal",
            Tone::Persuasive => "persuasive",
            Tone::Informative => "informative",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "friendly" => Ok(Tone::Friendly),
            "formal" => Ok(Tone::Formal),
            "persuasive" => Ok(Tone::Persuasive),
            "informative" => Ok(Tone::Informative),
            other => Err(format!("unknown tone '{}'", other)),
        }
    }
}

impl TryFrom<String> for Tone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Output language for an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    Dutch,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Dutch => "nl",
        }
    }

    /// English display name, used in prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Dutch => "Dutch",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Accepts ISO codes or English names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "es" | "spanish" => Ok(Language::Spanish),
            "fr" | "french" => Ok(Language::French),
            "de" | "german" => Ok(Language::German),
            "it" | "italian" => Ok(Language::Italian),
            "pt" | "portuguese" => Ok(Language::Portuguese),
            "nl" | "dutch" => Ok(Language::Dutch),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One article request, as read from a spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSpec {
    pub title: String,
    /// Requested sub-headings. Empty means the generator picks its own.
    #[serde(default)]
    pub sub_headings: Vec<String>,
    /// De-duplicated case-insensitively, first occurrence wins.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub tone: Tone,
    pub language: Language,
}

impl RowSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sub_headings: Vec::new(),
            keywords: Vec::new(),
            tone: Tone::default(),
            language: Language::default(),
        }
    }

    pub fn with_sub_headings<I, S>(mut self, headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_headings = headings.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = dedup_keywords(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

pub(crate) fn dedup_keywords(keywords: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}

/// Whether a parsed row can be sent to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowValidity {
    Valid,
    /// The row is recorded as failed with this reason without being generated.
    Malformed(String),
}

/// A row spec plus its position and validity flag.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    /// Zero-based position among data rows; the ordering key for results.
    pub index: usize,
    /// One-based line number in the source sheet, for diagnostics.
    pub line: usize,
    pub spec: RowSpec,
    pub validity: RowValidity,
}

impl ParsedRow {
    pub fn valid(index: usize, line: usize, spec: RowSpec) -> Self {
        Self {
            index,
            line,
            spec,
            validity: RowValidity::Valid,
        }
    }

    pub fn malformed(index: usize, line: usize, spec: RowSpec, reason: impl Into<String>) -> Self {
        Self {
            index,
            line,
            spec,
            validity: RowValidity::Malformed(reason.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.validity, RowValidity::Valid)
    }
}
