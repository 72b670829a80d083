//! Prompt template parsing and rendering
//!
//! Variable syntax: `{{name}}`, with optional whitespace inside the braces
//! (`{{ name }}`). Names match `[A-Za-z_][A-Za-z0-9_]*`. Anything else between
//! double braces (`{{123x}}`, `{{-x}}`, `{{a b}}`) is plain text.
//!
//! Rendering is lenient: a reference whose name has no value is left exactly as
//! written, so a partially filled prompt stays visibly partial.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Matches `{{ identifier }}`
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("variable pattern is valid")
});

/// Concrete variable values for one render, ordered for stable audit output
pub type VariableValues = BTreeMap<String, String>;

/// Extract variable names in first-occurrence order, without duplicates
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for caps in VARIABLE_PATTERN.captures_iter(template) {
        let name = &caps[1];

        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }

    names
}

/// Substitute every reference whose name is present in `values`.
///
/// Values are inserted verbatim and never re-scanned for references.
pub fn fill_variables(template: &str, values: &VariableValues) -> String {
    VARIABLE_PATTERN
        .replace_all(template, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// A prompt template together with the variables it declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPromptTemplate")]
pub struct PromptTemplate {
    content: String,
    variables: Vec<String>,
}

/// Stored form; declared variables are always re-derived from the content
#[derive(Deserialize)]
struct RawPromptTemplate {
    content: String,
}

impl From<RawPromptTemplate> for PromptTemplate {
    fn from(raw: RawPromptTemplate) -> Self {
        Self::parse(raw.content)
    }
}

impl PromptTemplate {
    /// Parse a template string. Never fails: malformed references are text.
    pub fn parse(content: impl Into<String>) -> Self {
        let content = content.into();
        let variables = extract_variables(&content);
        Self { content, variables }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn render(&self, values: &VariableValues) -> String {
        fill_variables(&self.content, values)
    }

    /// Declared variables that `values` does not provide
    pub fn missing_variables(&self, values: &VariableValues) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|name| !values.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}
