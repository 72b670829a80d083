//! Storage domain - persistence port shared by workflows, prompts and executions

mod entity;
mod repository;

pub use entity::{StorageEntity, StorageKey};
pub use repository::{check_revision, Storage};

#[cfg(test)]
pub use repository::mock;
