//! Text-completion port consumed by the step runner

mod pricing;
mod provider;

pub use pricing::ModelPricing;
pub use provider::{Completion, CompletionProvider};

#[cfg(test)]
pub use provider::MockCompletionProvider;
