//! Declarative extraction rules
//!
//! A rule set maps unique field names to a CSS selector, the part of each
//! matched element to read, and how many matches to keep. Rule sets are
//! validated when built and immutable afterwards, so one instance can be
//! shared read-only by every crawl job.

use crate::config::FieldEntry;
use crate::extract::record::URL_FIELD;
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;

/// The part of a matched element a rule reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Trimmed visible text of the element
    Text,
    /// Value of the named attribute
    Named(String),
}

impl Attribute {
    /// Parses the config spelling: `"text"` or an attribute name
    pub fn from_config(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::Validation(
                "attribute cannot be empty".to_string(),
            ));
        }

        if value.eq_ignore_ascii_case("text") {
            Ok(Self::Text)
        } else {
            Ok(Self::Named(value.to_ascii_lowercase()))
        }
    }

    /// Returns true for attributes whose values are resolved to absolute URLs
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Named(name) if name == "href" || name == "src")
    }
}

/// Whether a rule yields one value or all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// First match only; no match yields null
    Single,
    /// Every match in document order; no match yields an empty list
    Many,
}

impl Multiplicity {
    pub fn from_multiple(multiple: bool) -> Self {
        if multiple {
            Self::Many
        } else {
            Self::Single
        }
    }
}

/// A single validated extraction rule
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    source: String,
    selector: Selector,
    attribute: Attribute,
    multiplicity: Multiplicity,
}

impl ExtractionRule {
    /// Creates a rule, compiling its selector
    ///
    /// # Returns
    ///
    /// * `Ok(ExtractionRule)` - The selector compiled
    /// * `Err(ConfigError::InvalidSelector)` - The selector is empty or not valid CSS
    pub fn new(
        selector: &str,
        attribute: Attribute,
        multiplicity: Multiplicity,
    ) -> Result<Self, ConfigError> {
        let compiled = crate::config::validation::parse_selector(selector)?;

        if let Attribute::Named(name) = &attribute {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "attribute name cannot be empty".to_string(),
                ));
            }
        }

        Ok(Self {
            source: selector.to_string(),
            selector: compiled,
            attribute,
            multiplicity,
        })
    }

    /// The selector as written in the config
    pub fn selector_source(&self) -> &str {
        &self.source
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }
}

/// Ordered mapping from unique field name to rule
#[derive(Debug, Clone)]
pub struct ExtractionRuleSet {
    rules: Vec<(String, ExtractionRule)>,
}

impl ExtractionRuleSet {
    /// Builds a rule set, rejecting empty or duplicate field names
    pub fn new(rules: Vec<(String, ExtractionRule)>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();

        for (name, _) in &rules {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "field name cannot be empty".to_string(),
                ));
            }

            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateField(name.clone()));
            }

            if name == URL_FIELD {
                tracing::warn!(
                    "Field '{}' is reserved and will be overwritten with the page URL",
                    URL_FIELD
                );
            }
        }

        Ok(Self { rules })
    }

    /// Builds a rule set from `[[fields]]` config entries
    pub fn from_entries(entries: &[FieldEntry]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[fields]] entry is required".to_string(),
            ));
        }

        let rules = entries
            .iter()
            .map(|entry| {
                let rule = ExtractionRule::new(
                    &entry.selector,
                    Attribute::from_config(&entry.attribute)?,
                    Multiplicity::from_multiple(entry.multiple),
                )?;
                Ok((entry.name.clone(), rule))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Self::new(rules)
    }

    /// Iterates rules in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtractionRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn get(&self, name: &str) -> Option<&ExtractionRule> {
        self.rules
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rule)| rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
