//! Locale value type for localized template lookups.
//!
//! A [`Locale`] is a language tag with an optional region, `en` or `en_US`.
//! It exists for candidate expansion (full locale, then language only, then
//! no locale) and for the file-layout suffix of the file loader; nothing in
//! the engine interprets it beyond that.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A language tag with an optional region, such as `en` or `en_US`.
///
/// Case is normalized on construction: languages are lowercased, regions
/// uppercased, so `EN-us` and `en_US` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    /// Creates a locale from a language and optional region.
    pub fn new(language: impl Into<String>, region: Option<&str>) -> Self {
        Self {
            language: language.into().to_ascii_lowercase(),
            region: region.map(str::to_ascii_uppercase),
        }
    }

    /// Creates a region-less locale.
    pub fn language(language: impl Into<String>) -> Self {
        Self::new(language, None)
    }

    /// The language part, lowercased.
    pub fn language_code(&self) -> &str {
        &self.language
    }

    /// The region part, uppercased, when present.
    pub fn region_code(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn has_region(&self) -> bool {
        self.region.is_some()
    }

    /// This locale with the region dropped.
    pub fn language_only(&self) -> Self {
        Self {
            language: self.language.clone(),
            region: None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}_{}", self.language, region),
            None => write!(f, "{}", self.language),
        }
    }
}

/// Error parsing a locale tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid locale {input:?}: {reason}")]
pub struct ParseLocaleError {
    /// The rejected input.
    pub input: String,
    /// What made it unparseable.
    pub reason: &'static str,
}

impl FromStr for Locale {
    type Err = ParseLocaleError;

    /// Parses `en`, `en_US` or `en-US` style tags.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ParseLocaleError {
            input: s.to_string(),
            reason,
        };
        let (language, region) = match s.split_once(['_', '-']) {
            Some((language, region)) => (language, Some(region)),
            None => (s, None),
        };
        if !valid_part(language, 8, char::is_ascii_alphabetic) {
            return Err(invalid("language must be 1-8 ASCII letters"));
        }
        if let Some(region) = region {
            if !valid_part(region, 3, char::is_ascii_alphanumeric) {
                return Err(invalid("region must be 1-3 ASCII letters or digits"));
            }
        }
        Ok(Self::new(language, region))
    }
}

fn valid_part(part: &str, max_len: usize, valid: fn(&char) -> bool) -> bool {
    !part.is_empty() && part.len() <= max_len && part.chars().all(|c| valid(&c))
}
