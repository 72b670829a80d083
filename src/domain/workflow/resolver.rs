//! Variable resolution for one step
//!
//! Missing sources are omitted rather than treated as errors, so the rendered
//! prompt keeps the placeholder. Every omission is reported as a
//! [`ResolutionGap`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::source::{InputMapping, SourceRef};
use crate::domain::prompt::VariableValues;

/// Completed outputs keyed by step order
pub type StepOutputs = BTreeMap<usize, String>;

/// Why a mapped variable was left out of the resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    MissingInitialField,
    StepOutputUnavailable,
    UnrecognizedSource,
}

/// A mapped variable that received no value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionGap {
    pub variable: String,
    pub source: SourceRef,
    pub reason: GapReason,
}

/// Concrete values for one step plus the variables that could not be resolved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub values: VariableValues,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<ResolutionGap>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Resolve a step's mapping against the initial input and earlier outputs
pub fn resolve(
    mapping: Option<&InputMapping>,
    initial_input: &Map<String, Value>,
    step_outputs: &StepOutputs,
) -> Resolution {
    let mut resolution = Resolution::default();

    let Some(mapping) = mapping else {
        return resolution;
    };

    for (variable, source) in mapping {
        let resolved = match source {
            SourceRef::Initial(field) => initial_input
                .get(field)
                .map(value_to_text)
                .ok_or(GapReason::MissingInitialField),
            SourceRef::StepOutput(index) => step_outputs
                .get(index)
                .cloned()
                .ok_or(GapReason::StepOutputUnavailable),
            SourceRef::Unrecognized(_) => Err(GapReason::UnrecognizedSource),
        };

        match resolved {
            Ok(value) => {
                resolution.values.insert(variable.clone(), value);
            }
            Err(reason) => resolution.gaps.push(ResolutionGap {
                variable: variable.clone(),
                source: source.clone(),
                reason,
            }),
        }
    }

    resolution
}

/// Textual form of an initial input value.
///
/// Strings are used as-is, numbers and booleans in canonical form, `null` as
/// the empty string, arrays and objects as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::source::parse_mapping;
    use serde_json::json;

    fn input(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn test_no_mapping_is_empty() {
        let initial = input(json!({"a": "x"}));
        assert_eq!(resolve(None, &initial, &StepOutputs::new()), Resolution::default());

        let empty = InputMapping::new();
        let resolution = resolve(Some(&empty), &initial, &StepOutputs::new());
        assert!(resolution.values.is_empty());
        assert!(resolution.is_complete());
    }

    #[test]
    fn test_missing_initial_field_is_omitted() {
        let mapping = parse_mapping([("name", "initial.missing")]);
        let resolution = resolve(
            Some(&mapping),
            &input(json!({"other": "x"})),
            &StepOutputs::new(),
        );

        assert!(resolution.values.is_empty());
        assert_eq!(
            resolution.gaps,
            vec![ResolutionGap {
                variable: "name".to_string(),
                source: SourceRef::Initial("missing".to_string()),
                reason: GapReason::MissingInitialField,
            }]
        );
    }

    #[test]
    fn test_missing_step_output_is_omitted() {
        let mapping = parse_mapping([("input", "step.0.output"), ("later", "step.3.output")]);
        let outputs = StepOutputs::from([(0, "first output".to_string())]);

        let resolution = resolve(Some(&mapping), &Map::new(), &outputs);

        assert_eq!(resolution.values.get("input").map(String::as_str), Some("first output"));
        assert!(!resolution.values.contains_key("later"));
        assert_eq!(resolution.gaps.len(), 1);
        assert_eq!(resolution.gaps[0].reason, GapReason::StepOutputUnavailable);
    }

    #[test]
    fn test_coerces_scalars_to_text() {
        let mapping = parse_mapping([("count", "initial.number"), ("active", "initial.boolean")]);
        let resolution = resolve(
            Some(&mapping),
            &input(json!({"number": 42, "boolean": true})),
            &StepOutputs::new(),
        );

        let expected: VariableValues = [
            ("count".to_string(), "42".to_string()),
            ("active".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(resolution.values, expected);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!(1.5)), "1.5");
        assert_eq!(value_to_text(&json!(-7)), "-7");
        assert_eq!(value_to_text(&json!(false)), "false");
        assert_eq!(value_to_text(&Value::Null), "");
        assert_eq!(value_to_text(&json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(value_to_text(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn test_unrecognized_source_reported() {
        let mapping = parse_mapping([("x", "request.name")]);
        let resolution = resolve(Some(&mapping), &input(json!({"name": "n"})), &StepOutputs::new());

        assert!(resolution.values.is_empty());
        assert_eq!(resolution.gaps[0].reason, GapReason::UnrecognizedSource);
        assert_eq!(resolution.gaps[0].source.to_string(), "request.name");
    }
}
