pub mod api;
pub mod backend;
pub mod builder;
pub mod config;

pub use api::client::Client;
pub use api::experiment::Experiment;
pub use api::id::{ExperimentName, Namespace};
pub use builder::{ExperimentBuilder, JobTemplate};
pub use config::ServerConfig;
