use serde::{Deserialize, Serialize};
use std::fmt;

// EXPERIMENTS

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentName(String);

impl AsRef<str> for ExperimentName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<String> for ExperimentName {
    fn from(name: String) -> Self {
        ExperimentName(name)
    }
}

impl From<&str> for ExperimentName {
    fn from(name: &str) -> Self {
        ExperimentName(name.to_owned())
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// NAMESPACES

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<String> for Namespace {
    fn from(namespace: String) -> Self {
        Namespace(namespace)
    }
}

impl From<&str> for Namespace {
    fn from(namespace: &str) -> Self {
        Namespace(namespace.to_owned())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
