use crate::api::{error::*, experiment::*, id::*};

/// Access to a Katib service.
///
/// Every call is a single blocking round trip. Nothing is retried.
#[rustfmt::skip]
pub trait Client {
    fn create_experiment(&mut self, experiment: &Experiment, namespace: &Namespace) -> Result<Experiment, CreateError>;
    fn get_experiment(&mut self, name: &ExperimentName, namespace: &Namespace) -> Result<Experiment, GetError>;
    fn list_experiments(&mut self, namespace: &Namespace) -> Result<Vec<Experiment>, RemoteError>;
    fn delete_experiment(&mut self, name: &ExperimentName, namespace: &Namespace) -> Result<(), DeleteError>;
}
