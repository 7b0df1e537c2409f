//! Declarative field extraction
//!
//! - `rules`: validated rule sets built from `[[fields]]` config entries
//! - `record`: the extracted record and its field values
//! - `extractor`: applies a rule set to a page snapshot

mod extractor;
mod record;
mod rules;

pub use extractor::extract;
pub use record::{FieldValue, Record, URL_FIELD};
pub use rules::{Attribute, ExtractionRule, ExtractionRuleSet, Multiplicity};
