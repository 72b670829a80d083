//! Prompt domain - template engine and the prompt library

mod entity;
pub mod template;

pub use entity::{Prompt, PromptId};
pub use template::{extract_variables, fill_variables, PromptTemplate, VariableValues};
