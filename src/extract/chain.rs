//! Ordered fallback selector chains
//!
//! A chain is a list of `(locator, extraction mode)` candidates tried left to
//! right. The first candidate producing a non-empty value wins. Absence is
//! always `None`, never an error.

use crate::url::{resolve_href, resolve_src};
use crate::ConfigError;
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use url::Url;

/// Attribute lookup order for image candidates without an explicit list
pub const DEFAULT_IMAGE_ATTRS: [&str; 4] = ["src", "data-src", "data-lazy-src", "srcset"];

/// How a value is read from the first node matched by a locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Trimmed concatenated descendant text
    Text,
    /// Raw value of the named attribute
    Attribute(String),
    /// `href` resolved against the page URL
    HrefResolved,
    /// First non-empty attribute from an ordered list, resolved against the page URL
    ImageSourceFallback(Vec<String>),
}

/// One chain entry as written in a selector table
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateEntry {
    pub css: String,
    #[serde(default)]
    pub mode: ModeName,
    /// Attribute name for `attr` mode
    #[serde(default)]
    pub name: Option<String>,
    /// Lookup order for `image` mode
    #[serde(default)]
    pub attrs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeName {
    #[default]
    Text,
    Href,
    Attr,
    Image,
}

/// A compiled candidate
#[derive(Debug, Clone)]
pub struct SelectorCandidate {
    pub locator: String,
    pub mode: ExtractionMode,
    selector: Selector,
}

impl SelectorCandidate {
    /// Compiles a locator with the given mode
    pub fn new(chain: &str, locator: &str, mode: ExtractionMode) -> Result<Self, ConfigError> {
        let selector = Selector::parse(locator).map_err(|_| ConfigError::InvalidSelector {
            chain: chain.to_string(),
            locator: locator.to_string(),
        })?;

        Ok(Self {
            locator: locator.to_string(),
            mode,
            selector,
        })
    }

    /// Compiles a candidate from its table entry
    pub fn from_entry(chain: &str, entry: &CandidateEntry) -> Result<Self, ConfigError> {
        let mode = match entry.mode {
            ModeName::Text => ExtractionMode::Text,
            ModeName::Href => ExtractionMode::HrefResolved,
            ModeName::Attr => match entry.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => ExtractionMode::Attribute(name.to_string()),
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "Chain '{}': attr locator '{}' needs a name",
                        chain, entry.css
                    )))
                }
            },
            ModeName::Image => ExtractionMode::ImageSourceFallback(
                entry.attrs
                    .clone()
                    .filter(|attrs| !attrs.is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_ATTRS.iter().map(|a| a.to_string()).collect()),
            ),
        };

        Self::new(chain, &entry.css, mode)
    }

    /// Reads this candidate's value from a single element
    fn read(&self, element: ElementRef<'_>, base_url: &Url) -> Option<String> {
        match &self.mode {
            ExtractionMode::Text => non_empty(element.text().collect::<String>().trim()),
            ExtractionMode::Attribute(name) => {
                element.value().attr(name).and_then(|v| non_empty(v.trim()))
            }
            ExtractionMode::HrefResolved => element
                .value()
                .attr("href")
                .and_then(|href| resolve_href(href, base_url)),
            ExtractionMode::ImageSourceFallback(attrs) => attrs
                .iter()
                .filter_map(|attr| element.value().attr(attr))
                .find(|v| !v.trim().is_empty())
                .and_then(|v| resolve_src(v, base_url)),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// An ordered list of candidates for one logical field
#[derive(Debug, Clone)]
pub struct SelectorChain {
    name: String,
    candidates: Vec<SelectorCandidate>,
}

impl SelectorChain {
    pub fn new(name: impl Into<String>, candidates: Vec<SelectorCandidate>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }

    /// Compiles every entry of a table chain
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSelector` for the first unparsable locator.
    pub fn compile(name: &str, entries: &[CandidateEntry]) -> Result<Self, ConfigError> {
        let candidates = entries
            .iter()
            .map(|entry| SelectorCandidate::from_entry(name, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name, candidates))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn candidates(&self) -> &[SelectorCandidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns the value of the first candidate that yields one
    ///
    /// Each candidate looks only at the first node its locator matches
    /// beneath `scope`; an empty value falls through to the next candidate.
    ///
    /// # Arguments
    ///
    /// * `scope` - Element whose descendants are searched (a card or the document root)
    /// * `base_url` - URL that relative hrefs and image sources resolve against
    pub fn extract(&self, scope: ElementRef<'_>, base_url: &Url) -> Option<String> {
        self.candidates.iter().find_map(|candidate| {
            scope
                .select(&candidate.selector)
                .next()
                .and_then(|element| candidate.read(element, base_url))
        })
    }

    /// Returns every non-empty value of the first candidate matching at least one node
    ///
    /// Used for link lists, where one locator describes many anchors.
    pub fn extract_all(&self, scope: ElementRef<'_>, base_url: &Url) -> Vec<String> {
        for candidate in &self.candidates {
            let values: Vec<String> = scope
                .select(&candidate.selector)
                .filter_map(|element| candidate.read(element, base_url))
                .collect();

            if !values.is_empty() {
                return values;
            }
        }
        Vec::new()
    }

    /// Returns the elements matched by the first candidate that matches anything
    ///
    /// The winning locator is returned alongside its elements for logging.
    pub fn select_blocks<'a>(&'a self, scope: ElementRef<'a>) -> Option<(&'a str, Vec<ElementRef<'a>>)> {
        self.candidates.iter().find_map(|candidate| {
            let blocks: Vec<ElementRef<'a>> = scope.select(&candidate.selector).collect();
            if blocks.is_empty() {
                None
            } else {
                Some((candidate.locator.as_str(), blocks))
            }
        })
    }
}
