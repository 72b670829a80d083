//! Infrastructure layer - adapters for the domain ports and the services built on them

pub mod completion;
pub mod logging;
pub mod observability;
pub mod services;
pub mod storage;
pub mod workflow;
