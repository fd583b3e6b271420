//! Local construction and validation of experiment descriptors.

mod experiment;
mod job;
mod placeholder;

pub use experiment::{validate, ExperimentBuilder};
pub use job::JobTemplate;
pub use placeholder::{placeholder, placeholders};
