//! Workflow domain entity

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use super::source::{InputMapping, SourceRef};
use crate::domain::id::define_id;
use crate::domain::prompt::{PromptId, PromptTemplate};
use crate::domain::storage::StorageEntity;

define_id!(
    /// Validated workflow identifier
    WorkflowId,
    "Workflow",
    "wf"
);

define_id!(
    /// Validated step identifier
    StepId,
    "Step",
    "step"
);

/// One prompt step within a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    id: StepId,

    /// 0-based position, kept contiguous by the owning workflow
    order: usize,

    prompt: PromptTemplate,

    /// Library prompt the template was copied from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_id: Option<PromptId>,

    #[serde(default)]
    input_mapping: InputMapping,
}

impl StepDefinition {
    pub fn new(id: StepId, prompt: PromptTemplate) -> Self {
        Self {
            id,
            order: 0,
            prompt,
            prompt_id: None,
            input_mapping: InputMapping::new(),
        }
    }

    pub fn with_prompt_id(mut self, prompt_id: PromptId) -> Self {
        self.prompt_id = Some(prompt_id);
        self
    }

    pub fn with_input_mapping(mut self, input_mapping: InputMapping) -> Self {
        self.input_mapping = input_mapping;
        self
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn prompt_id(&self) -> Option<&PromptId> {
        self.prompt_id.as_ref()
    }

    pub fn input_mapping(&self) -> &InputMapping {
        &self.input_mapping
    }

    /// First mapping entry that reads from this step or a later one
    pub fn forward_reference(&self) -> Option<(&str, usize)> {
        self.input_mapping
            .iter()
            .find_map(|(name, source)| match source {
                SourceRef::StepOutput(k) if *k >= self.order => Some((name.as_str(), *k)),
                _ => None,
            })
    }
}

/// A workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,

    name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Steps sorted by order
    steps: Vec<StepDefinition>,

    /// Incremented on every step change
    version: u32,

    created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            steps: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a step, assigning the next order
    pub fn with_step(mut self, mut step: StepDefinition) -> Self {
        step.order = self.steps.len();
        self.steps.push(step);
        self
    }

    // Getters

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn get_step(&self, id: &StepId) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id() == id)
    }

    pub fn contains_step(&self, id: &StepId) -> bool {
        self.get_step(id).is_some()
    }

    // Mutations

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.increment_version();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.increment_version();
    }

    /// Insert a step at `order` (clamped to the end), or append when absent
    pub fn insert_step(&mut self, step: StepDefinition, order: Option<usize>) -> &StepDefinition {
        let position = order.map_or(self.steps.len(), |o| o.min(self.steps.len()));
        self.steps.insert(position, step);
        self.renumber();
        self.increment_version();
        &self.steps[position]
    }

    /// Re-assign orders to follow `ordered_ids`, which must name every step exactly once
    pub fn reorder_steps(&mut self, ordered_ids: &[StepId]) -> Result<(), WorkflowError> {
        if ordered_ids.len() != self.steps.len() {
            return Err(WorkflowError::validation(format!(
                "Reorder lists {} step(s) but workflow '{}' has {}",
                ordered_ids.len(),
                self.id,
                self.steps.len()
            )));
        }

        let mut seen = HashSet::new();
        for id in ordered_ids {
            if !seen.insert(id) {
                return Err(WorkflowError::validation(format!(
                    "Step '{}' listed more than once",
                    id
                )));
            }
            if !self.contains_step(id) {
                return Err(WorkflowError::step_not_found(id.as_str()));
            }
        }

        let mut remaining = std::mem::take(&mut self.steps);
        for id in ordered_ids {
            if let Some(index) = remaining.iter().position(|s| s.id() == id) {
                self.steps.push(remaining.swap_remove(index));
            }
        }

        self.renumber();
        self.increment_version();
        Ok(())
    }

    /// Replace a step's input mapping
    pub fn set_step_mapping(
        &mut self,
        id: &StepId,
        input_mapping: InputMapping,
    ) -> Result<&StepDefinition, WorkflowError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| WorkflowError::step_not_found(id.as_str()))?;

        self.steps[index].input_mapping = input_mapping;
        self.increment_version();
        Ok(&self.steps[index])
    }

    /// Remove a step and close the gap in orders
    pub fn remove_step(&mut self, id: &StepId) -> Result<StepDefinition, WorkflowError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| WorkflowError::step_not_found(id.as_str()))?;

        let removed = self.steps.remove(index);
        self.renumber();
        self.increment_version();
        Ok(removed)
    }

    /// Check the definition can run: enough steps, contiguous orders, and
    /// every step reference pointing strictly backwards.
    pub fn validate_for_execution(&self, min_steps: usize) -> Result<(), WorkflowError> {
        let required = min_steps.max(1);
        if self.steps.len() < required {
            return Err(WorkflowError::empty_workflow(
                self.id.as_str(),
                self.steps.len(),
                required,
            ));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.order() != index {
                return Err(WorkflowError::validation(format!(
                    "Step '{}' has order {} at position {}",
                    step.id(),
                    step.order(),
                    index
                )));
            }

            if let Some((variable, source_step)) = step.forward_reference() {
                return Err(WorkflowError::forward_reference(
                    step.order(),
                    variable,
                    source_step,
                ));
            }
        }

        Ok(())
    }

    fn renumber(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.order = index;
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn increment_version(&mut self) {
        self.version += 1;
        self.touch();
    }
}

impl StorageEntity for Workflow {
    type Key = WorkflowId;

    fn key(&self) -> &Self::Key {
        &self.id
    }

    fn revision(&self) -> Option<u64> {
        Some(u64::from(self.version))
    }
}
