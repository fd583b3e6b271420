use serde::{Deserialize, Serialize};

use crate::Experiment;

/// Status reported by the Katib controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub start_time: Option<String>,
    pub completion_time: Option<String>,
    pub last_reconcile_time: Option<String>,
    pub current_optimal_trial: Option<OptimalTrial>,
    #[serde(default)]
    pub trials: u32,
    #[serde(default)]
    pub trials_succeeded: u32,
    #[serde(default)]
    pub trials_failed: u32,
    #[serde(default)]
    pub trials_running: u32,
    #[serde(default)]
    pub trials_pending: u32,
    #[serde(default)]
    pub trials_killed: u32,
    #[serde(default)]
    pub trials_early_stopped: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_update_time: Option<String>,
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Created,
    Running,
    Restarting,
    Succeeded,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimalTrial {
    #[serde(default)]
    pub best_trial_name: String,
    #[serde(default)]
    pub parameter_assignments: Vec<ParameterAssignment>,
    pub observation: Option<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAssignment {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub metrics: Vec<MetricObservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    pub name: String,
    pub latest: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Status queries, mirroring the checks of the Katib SDK.
impl Experiment {
    /// The most recent condition of the given type, if any.
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .rev()
            .find(|c| c.condition_type == condition_type)
    }

    fn has_condition(&self, condition_type: ConditionType) -> bool {
        self.condition(condition_type).map_or(false, Condition::is_true)
    }

    pub fn is_created(&self) -> bool {
        self.has_condition(ConditionType::Created)
    }

    pub fn is_running(&self) -> bool {
        self.has_condition(ConditionType::Running)
    }

    pub fn is_restarting(&self) -> bool {
        self.has_condition(ConditionType::Restarting)
    }

    pub fn is_succeeded(&self) -> bool {
        self.has_condition(ConditionType::Succeeded)
    }

    pub fn is_failed(&self) -> bool {
        self.has_condition(ConditionType::Failed)
    }

    pub fn optimal_trial(&self) -> Option<&OptimalTrial> {
        self.status.as_ref()?.current_optimal_trial.as_ref()
    }

    /// Parameter assignments of the best trial so far.
    ///
    /// Empty until the service has observed at least one finished trial.
    pub fn optimal_hyperparameters(&self) -> &[ParameterAssignment] {
        match self.optimal_trial() {
            Some(trial) if !trial.best_trial_name.is_empty() => &trial.parameter_assignments,
            _ => &[],
        }
    }
}
