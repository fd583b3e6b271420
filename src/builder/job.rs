use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A single-container batch `Job` used as the trial template.
///
/// Trial parameters are passed through the command, usually as
/// `--flag=${trialParameters.<name>}` (see [`placeholder`](crate::builder::placeholder)).
#[derive(Debug, Clone, PartialEq)]
pub struct JobTemplate {
    container_name: String,
    image: String,
    command: Vec<String>,
    restart_policy: String,
    annotations: BTreeMap<String, String>,
}

impl JobTemplate {
    pub fn new(container_name: impl Into<String>, image: impl Into<String>) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert("sidecar.istio.io/inject".to_string(), "false".to_string());
        JobTemplate {
            container_name: container_name.into(),
            image: image.into(),
            command: Vec::new(),
            restart_policy: "Never".to_string(),
            annotations,
        }
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn restart_policy(mut self, policy: impl Into<String>) -> Self {
        self.restart_policy = policy.into();
        self
    }

    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn to_manifest(&self) -> Value {
        json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "spec": {
                "template": {
                    "metadata": { "annotations": self.annotations },
                    "spec": {
                        "containers": [{
                            "name": self.container_name,
                            "image": self.image,
                            "command": self.command,
                        }],
                        "restartPolicy": self.restart_policy,
                    }
                }
            }
        })
    }
}
