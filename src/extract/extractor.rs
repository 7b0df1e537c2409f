//! Applies a rule set to one page snapshot
//!
//! Extraction is a pure function of its inputs. A rule that matches nothing
//! is not an error: single-value rules yield null and multi-value rules
//! yield an empty list.

use crate::extract::record::{FieldValue, Record};
use crate::extract::rules::{Attribute, ExtractionRule, ExtractionRuleSet, Multiplicity};
use crate::render::PageSnapshot;
use scraper::ElementRef;
use url::Url;

/// Elements whose text is never rendered
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracts one record from a snapshot
///
/// Each rule contributes one field, in rule order. The reserved `url` field
/// is written last with the snapshot's base URL and replaces any rule output
/// of the same name.
///
/// # Example
///
/// ```
/// use trawl::extract::{extract, Attribute, ExtractionRule, ExtractionRuleSet, Multiplicity};
/// use trawl::render::PageSnapshot;
/// use url::Url;
///
/// let rules = ExtractionRuleSet::new(vec![(
///     "title".to_string(),
///     ExtractionRule::new("title", Attribute::Text, Multiplicity::Single).unwrap(),
/// )])
/// .unwrap();
/// let snapshot = PageSnapshot::from_html(
///     "<html><head><title> Test </title></head></html>",
///     Url::parse("http://x/").unwrap(),
/// );
///
/// let record = extract(&snapshot, &rules);
/// assert_eq!(record.get("title").and_then(|v| v.as_str()), Some("Test"));
/// assert_eq!(record.url(), Some("http://x/"));
/// ```
pub fn extract(snapshot: &PageSnapshot, rules: &ExtractionRuleSet) -> Record {
    let mut record = Record::new();

    for (name, rule) in rules.iter() {
        record.insert(name, extract_field(snapshot, rule));
    }

    record.set_url(snapshot.base_url().as_str());
    record
}

fn extract_field(snapshot: &PageSnapshot, rule: &ExtractionRule) -> FieldValue {
    let base_url = snapshot.base_url();
    let mut matches = snapshot.select(rule.selector());

    match rule.multiplicity() {
        Multiplicity::Single => matches
            .next()
            .and_then(|element| element_value(element, rule.attribute(), base_url))
            .map(FieldValue::Scalar)
            .unwrap_or(FieldValue::Null),
        Multiplicity::Many => FieldValue::List(
            matches
                .filter_map(|element| element_value(element, rule.attribute(), base_url))
                .collect(),
        ),
    }
}

/// Reads the configured part of one element
///
/// Returns None when a named attribute is absent from the element.
fn element_value(element: ElementRef<'_>, attribute: &Attribute, base_url: &Url) -> Option<String> {
    match attribute {
        Attribute::Text => Some(visible_text(element)),
        Attribute::Named(name) => {
            let raw = element.value().attr(name)?;
            if attribute.is_link() && !raw.trim().is_empty() {
                Some(resolve_against(base_url, raw))
            } else {
                Some(raw.to_string())
            }
        }
    }
}

/// Collects an element's rendered text with whitespace collapsed
pub(crate) fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| INVISIBLE_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });

        if !hidden {
            parts.extend(text.split_whitespace());
        }
    }

    parts.join(" ")
}

/// Resolves a possibly relative link against the page's base URL
///
/// Values that cannot be joined are kept as written.
fn resolve_against(base_url: &Url, raw: &str) -> String {
    let raw = raw.trim();
    match base_url.join(raw) {
        Ok(absolute) => absolute.to_string(),
        Err(_) => raw.to_string(),
    }
}
