use thiserror::Error;

pub type RemoteError = anyhow::Error;

#[derive(Error, Debug)]
pub enum CreateError {
    #[error("the experiment {0} already exists")]
    AlreadyExists(String),
    #[error("an error ocurred in the remote service: {0:?}")]
    Remote(#[from] RemoteError),
}

#[derive(Error, Debug)]
pub enum GetError {
    #[error("the experiment {0} does not exist")]
    DoesNotExist(String),
    #[error("an error ocurred in the remote service: {0:?}")]
    Remote(#[from] RemoteError),
}

pub type DeleteError = GetError;

/// Reasons an experiment descriptor is rejected before it is sent anywhere.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("the experiment has no {0}")]
    Missing(&'static str),
    #[error("the search space needs at least one parameter")]
    NoParameters,
    #[error("the parameter {0} is declared more than once")]
    DuplicateParameter(String),
    #[error("the parameter {name} has an invalid feasible space: {reason}")]
    InvalidFeasibleSpace { name: String, reason: String },
    #[error("the parameter {0} is never referenced by a trial parameter")]
    UnusedParameter(String),
    #[error("the trial parameter {name} references the undeclared parameter {reference}")]
    UnresolvedReference { name: String, reference: String },
    #[error("the trial parameter {0} is declared more than once")]
    DuplicateTrialParameter(String),
    #[error("the trial template uses the undeclared placeholder ${{trialParameters.{0}}}")]
    UndeclaredPlaceholder(String),
    #[error("{0} must be a positive integer")]
    NonPositiveCount(&'static str),
    #[error("parallel trial count {parallel} exceeds max trial count {max}")]
    ParallelExceedsMax { parallel: u32, max: u32 },
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("the experiment is invalid: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Create(#[from] CreateError),
}
