pub mod client;
pub mod error;
pub mod experiment;
pub mod id;
pub mod status;

/// Katib custom resource coordinates.
pub mod resource {
    pub const GROUP: &str = "kubeflow.org";
    pub const VERSION: &str = "v1beta1";
    pub const API_VERSION: &str = "kubeflow.org/v1beta1";
    pub const KIND: &str = "Experiment";
    pub const PLURAL: &str = "experiments";
}

