use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{
    api::{resource, status::ExperimentStatus},
    ExperimentName, Namespace,
};

/// A Katib `Experiment` custom resource.
///
/// Built locally with [`ExperimentBuilder`](crate::ExperimentBuilder) and
/// returned by every [`Client`](crate::Client) query. The `status` is owned by
/// the service and is absent on freshly built descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ExperimentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExperimentStatus>,
}

impl Experiment {
    pub fn new(metadata: ObjectMeta, spec: ExperimentSpec) -> Self {
        Experiment {
            api_version: resource::API_VERSION.to_string(),
            kind: resource::KIND.to_string(),
            metadata,
            spec,
            status: None,
        }
    }

    pub fn name(&self) -> &ExperimentName {
        &self.metadata.name
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.metadata.namespace.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: ExperimentName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<ExperimentName>, namespace: impl Into<Namespace>) -> Self {
        ObjectMeta {
            name: name.into(),
            namespace: Some(namespace.into()),
            uid: None,
            creation_timestamp: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

/// Counts, search space and template are optional on the wire; NAS and
/// config-map experiments leave some of them out. The builder requires them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trial_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_trial_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failed_trial_count: Option<u32>,
    pub algorithm: AlgorithmSpec,
    pub objective: ObjectiveSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSpec>,
    pub trial_template: TrialTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_policy: Option<ResumePolicy>,
    /// Fields kept verbatim, like `metricsCollectorSpec`, `earlyStopping` or `nasConfig`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExperimentSpec {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmSpec {
    pub algorithm_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub algorithm_settings: Vec<AlgorithmSetting>,
}

impl AlgorithmSpec {
    pub fn new(algorithm_name: impl Into<String>) -> Self {
        AlgorithmSpec {
            algorithm_name: algorithm_name.into(),
            algorithm_settings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSetting {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveSpec {
    #[serde(rename = "type")]
    pub objective_type: ObjectiveType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
    pub objective_metric_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_metric_names: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectiveSpec {
    pub fn new(objective_type: ObjectiveType, metric: impl Into<String>) -> Self {
        ObjectiveSpec {
            objective_type,
            goal: None,
            objective_metric_name: metric.into(),
            additional_metric_names: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_goal(mut self, goal: f64) -> Self {
        self.goal = Some(goal);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveType {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    pub parameter_type: ParameterType,
    pub feasible_space: FeasibleSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Double,
    Int,
    Discrete,
    Categorical,
}

/// Bounds stay strings on the wire and are never reformatted locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeasibleSpace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<String>,
}

impl FeasibleSpace {
    pub fn range(min: impl Into<String>, max: impl Into<String>) -> Self {
        FeasibleSpace {
            min: Some(min.into()),
            max: Some(max.into()),
            ..FeasibleSpace::default()
        }
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FeasibleSpace {
            list: values.into_iter().map(Into::into).collect(),
            ..FeasibleSpace::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trial_parameters: Vec<TrialParameterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapSource>,
    /// Fields kept verbatim, like `successCondition`, `failureCondition` or `retain`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrialTemplate {
    pub fn from_spec(primary_container_name: Option<String>, trial_parameters: Vec<TrialParameterSpec>, trial_spec: Value) -> Self {
        TrialTemplate {
            primary_container_name,
            trial_parameters,
            trial_spec: Some(trial_spec),
            config_map: None,
            extra: Map::new(),
        }
    }
}

/// A trial template stored in a config map instead of inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialParameterSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumePolicy {
    Never,
    LongRunning,
    FromVolume,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_katib_field_names() {
        let objective = ObjectiveSpec::new(ObjectiveType::Minimize, "loss").with_goal(0.001);
        let json = serde_json::to_value(&objective).unwrap();
        assert_eq!(json["type"], "minimize");
        assert_eq!(json["objectiveMetricName"], "loss");
        assert!(json.get("additionalMetricNames").is_none());
    }

    #[test]
    fn feasible_space_keeps_bounds_verbatim() {
        let parameter = ParameterSpec {
            name: "lr".to_string(),
            parameter_type: ParameterType::Double,
            feasible_space: FeasibleSpace::range("0.010", "0.06"),
        };
        let json = serde_json::to_string(&parameter).unwrap();
        assert_eq!(
            json,
            r#"{"name":"lr","parameterType":"double","feasibleSpace":{"min":"0.010","max":"0.06"}}"#
        );
    }

    #[test]
    fn reads_experiments_without_counts_or_inline_template() {
        let nas = r#"
        {
            "apiVersion": "kubeflow.org/v1beta1",
            "kind": "Experiment",
            "metadata": { "name": "enas", "namespace": "team-1" },
            "spec": {
                "algorithm": { "algorithmName": "enas" },
                "objective": { "type": "maximize", "objectiveMetricName": "Validation-Accuracy" },
                "trialTemplate": {
                    "primaryContainerName": "training-container",
                    "configMap": {
                        "configMapName": "trial-templates",
                        "configMapNamespace": "kubeflow",
                        "templatePath": "enasCPUTemplate"
                    }
                },
                "nasConfig": { "graphConfig": { "numLayers": 8 } }
            }
        }
        "#;
        let experiment: Experiment = serde_json::from_str(nas).unwrap();
        assert_eq!(experiment.spec.max_trial_count, None);
        assert!(experiment.spec.parameters.is_empty());
        assert!(experiment.spec.trial_template.trial_spec.is_none());
        let config_map = experiment.spec.trial_template.config_map.as_ref().unwrap();
        assert_eq!(config_map.template_path.as_deref(), Some("enasCPUTemplate"));
        assert!(experiment.spec.extra.contains_key("nasConfig"));
    }

    #[test]
    fn unmodeled_fields_survive_a_round_trip() {
        let spec = r#"
        {
            "maxTrialCount": 3,
            "algorithm": { "algorithmName": "cmaes" },
            "objective": {
                "type": "minimize",
                "objectiveMetricName": "loss",
                "metricStrategies": [ { "name": "loss", "value": "min" } ]
            },
            "parameters": [],
            "trialTemplate": {
                "trialSpec": { "kind": "Job" },
                "successCondition": "status.conditions.#(type==\"Complete\")#|#(status==\"True\")#",
                "retain": true
            },
            "metricsCollectorSpec": { "collector": { "kind": "StdOut" } },
            "earlyStopping": { "algorithmName": "medianstop" }
        }
        "#;
        let parsed: ExperimentSpec = serde_json::from_str(spec).unwrap();
        let out = serde_json::to_string(&parsed).unwrap();
        assert!(out.contains("metricsCollectorSpec"));
        assert!(out.contains("earlyStopping"));
        assert!(out.contains("metricStrategies"));
        assert!(out.contains("successCondition"));
        assert!(out.contains(r#""retain":true"#));

        let reparsed: ExperimentSpec = serde_json::from_str(&out).unwrap();
        assert_eq!(reparsed, parsed);
    }
}
