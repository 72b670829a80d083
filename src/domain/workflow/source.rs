//! Input mapping source references
//!
//! A step maps each of its variables to one of:
//! - `initial.<field>` - a top-level field of the execution's initial input
//! - `step.<k>.output` - the completed output of the step at order `k`
//!
//! Anything else is kept as [`SourceRef::Unrecognized`] so resolution can report it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

const INITIAL_PREFIX: &str = "initial.";
const STEP_PREFIX: &str = "step.";
const OUTPUT_SUFFIX: &str = ".output";

/// A parsed source reference. Serialized as the string it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceRef {
    Initial(String),
    StepOutput(usize),
    Unrecognized(String),
}

impl SourceRef {
    pub fn parse(raw: &str) -> Self {
        if let Some(field) = raw.strip_prefix(INITIAL_PREFIX) {
            if !field.is_empty() {
                return Self::Initial(field.to_string());
            }
        }

        if let Some(index) = raw
            .strip_prefix(STEP_PREFIX)
            .and_then(|rest| rest.strip_suffix(OUTPUT_SUFFIX))
            .and_then(parse_step_index)
        {
            return Self::StepOutput(index);
        }

        Self::Unrecognized(raw.to_string())
    }

    /// Step index this reference depends on, if any
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::StepOutput(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

/// Canonical decimal only, so the reference prints back exactly as written
fn parse_step_index(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial(field) => write!(f, "{}{}", INITIAL_PREFIX, field),
            Self::StepOutput(index) => write!(f, "{}{}{}", STEP_PREFIX, index, OUTPUT_SUFFIX),
            Self::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

impl From<String> for SourceRef {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for SourceRef {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<SourceRef> for String {
    fn from(source: SourceRef) -> Self {
        source.to_string()
    }
}

/// Variable name to source reference, ordered by variable name
pub type InputMapping = BTreeMap<String, SourceRef>;

/// Build a mapping from raw `(variable, reference)` pairs
pub fn parse_mapping<I, K, V>(pairs: I) -> InputMapping
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(name, raw)| (name.into(), SourceRef::parse(raw.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initial() {
        assert_eq!(
            SourceRef::parse("initial.subject"),
            SourceRef::Initial("subject".to_string())
        );
        assert_eq!(
            SourceRef::parse("initial.user.name"),
            SourceRef::Initial("user.name".to_string())
        );
    }

    #[test]
    fn test_parse_step_output() {
        assert_eq!(SourceRef::parse("step.0.output"), SourceRef::StepOutput(0));
        assert_eq!(SourceRef::parse("step.12.output"), SourceRef::StepOutput(12));
        assert_eq!(SourceRef::parse("step.3.output").step_index(), Some(3));
    }

    #[test]
    fn test_parse_unrecognized() {
        for raw in [
            "initial.",
            "step.x.output",
            "step.-1.output",
            "step.+1.output",
            "step.01.output",
            "step.1.result",
            "request.name",
            "",
        ] {
            let source = SourceRef::parse(raw);
            assert!(!source.is_recognized(), "{raw} should be unrecognized");
            assert_eq!(source.to_string(), raw);
        }
    }

    #[test]
    fn test_display_matches_raw_reference() {
        for raw in ["initial.topic", "step.4.output"] {
            assert_eq!(SourceRef::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_mapping_serializes_as_strings() {
        let mapping = parse_mapping([("topic", "initial.subject"), ("input", "step.0.output")]);
        let json = serde_json::to_value(&mapping).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"input": "step.0.output", "topic": "initial.subject"})
        );

        let restored: InputMapping = serde_json::from_value(json).unwrap();
        assert_eq!(restored, mapping);
    }
}
