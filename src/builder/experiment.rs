use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    api::{
        error::{BuildError, SubmitError},
        experiment::{
            AlgorithmSpec, ExperimentSpec, FeasibleSpace, ObjectMeta, ObjectiveSpec, ObjectiveType, ParameterSpec,
            ParameterType, ResumePolicy, TrialParameterSpec, TrialTemplate,
        },
    },
    builder::{placeholders, JobTemplate},
    Client, Experiment,
};

/// Assembles an [`Experiment`] and checks it before anything leaves the process.
///
/// ```no_run
/// use katib::{backend::rest::Server, api::experiment::AlgorithmSpec, ExperimentBuilder, JobTemplate};
///
/// let job = JobTemplate::new("training-container", "docker.io/kubeflowkatib/pytorch-mnist-cpu:v0.14.0")
///     .command(vec!["python3", "/opt/pytorch-mnist/mnist.py", "--lr=${trialParameters.learningRate}"]);
/// let mut client = Server::new("http://127.0.0.1:8001");
/// ExperimentBuilder::new("cmaes-example", "team-1")
///     .algorithm(AlgorithmSpec::new("cmaes"))
///     .minimize("loss", Some(0.001))
///     .double_parameter("lr", "0.01", "0.06")
///     .trial_parameter("learningRate", "Learning rate for the training model", "lr")
///     .job(job)
///     .trial_counts(3, 2, 1)
///     .submit(&mut client)
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ExperimentBuilder {
    metadata: ObjectMeta,
    algorithm: Option<AlgorithmSpec>,
    objective: Option<ObjectiveSpec>,
    parameters: Vec<ParameterSpec>,
    trial_parameters: Vec<TrialParameterSpec>,
    primary_container_name: Option<String>,
    trial_spec: Option<Value>,
    max_trial_count: u32,
    parallel_trial_count: u32,
    max_failed_trial_count: u32,
    resume_policy: Option<ResumePolicy>,
}

impl ExperimentBuilder {
    pub fn new(name: &str, namespace: &str) -> Self {
        ExperimentBuilder {
            metadata: ObjectMeta::new(name, namespace),
            algorithm: None,
            objective: None,
            parameters: Vec::new(),
            trial_parameters: Vec::new(),
            primary_container_name: None,
            trial_spec: None,
            max_trial_count: 0,
            parallel_trial_count: 0,
            max_failed_trial_count: 0,
            resume_policy: None,
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn algorithm(mut self, algorithm: AlgorithmSpec) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn objective(mut self, objective: ObjectiveSpec) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn minimize(self, metric: &str, goal: Option<f64>) -> Self {
        let objective = ObjectiveSpec::new(ObjectiveType::Minimize, metric);
        self.objective(ObjectiveSpec { goal, ..objective })
    }

    pub fn maximize(self, metric: &str, goal: Option<f64>) -> Self {
        let objective = ObjectiveSpec::new(ObjectiveType::Maximize, metric);
        self.objective(ObjectiveSpec { goal, ..objective })
    }

    pub fn parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn double_parameter(self, name: &str, min: &str, max: &str) -> Self {
        self.parameter(ParameterSpec {
            name: name.to_string(),
            parameter_type: ParameterType::Double,
            feasible_space: FeasibleSpace::range(min, max),
        })
    }

    pub fn int_parameter(self, name: &str, min: &str, max: &str) -> Self {
        self.parameter(ParameterSpec {
            name: name.to_string(),
            parameter_type: ParameterType::Int,
            feasible_space: FeasibleSpace::range(min, max),
        })
    }

    pub fn categorical_parameter<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter(ParameterSpec {
            name: name.to_string(),
            parameter_type: ParameterType::Categorical,
            feasible_space: FeasibleSpace::list(values),
        })
    }

    /// Maps the template placeholder `name` to the search space parameter `reference`.
    pub fn trial_parameter(mut self, name: &str, description: &str, reference: &str) -> Self {
        self.trial_parameters.push(TrialParameterSpec {
            name: name.to_string(),
            description: Some(description.to_string()).filter(|d| !d.is_empty()),
            reference: reference.to_string(),
        });
        self
    }

    pub fn job(mut self, job: JobTemplate) -> Self {
        self.primary_container_name = Some(job.container_name().to_string());
        self.trial_spec = Some(job.to_manifest());
        self
    }

    /// Uses an arbitrary manifest as trial template.
    pub fn trial_spec(mut self, primary_container_name: Option<&str>, trial_spec: Value) -> Self {
        self.primary_container_name = primary_container_name.map(str::to_string);
        self.trial_spec = Some(trial_spec);
        self
    }

    pub fn trial_counts(mut self, max: u32, parallel: u32, max_failed: u32) -> Self {
        self.max_trial_count = max;
        self.parallel_trial_count = parallel;
        self.max_failed_trial_count = max_failed;
        self
    }

    pub fn resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<Experiment, BuildError> {
        if self.metadata.name.as_ref().is_empty() {
            return Err(BuildError::Missing("name"));
        }
        let spec = ExperimentSpec {
            max_trial_count: Some(self.max_trial_count),
            parallel_trial_count: Some(self.parallel_trial_count),
            max_failed_trial_count: Some(self.max_failed_trial_count),
            algorithm: self.algorithm.ok_or(BuildError::Missing("algorithm"))?,
            objective: self.objective.ok_or(BuildError::Missing("objective"))?,
            parameters: self.parameters,
            trial_template: TrialTemplate::from_spec(
                self.primary_container_name,
                self.trial_parameters,
                self.trial_spec.ok_or(BuildError::Missing("trial template"))?,
            ),
            resume_policy: self.resume_policy,
            extra: Map::new(),
        };
        validate(&spec)?;
        debug!(
            experiment = %self.metadata.name,
            algorithm = %spec.algorithm.algorithm_name,
            parameters = spec.parameters.len(),
            "experiment validated"
        );
        Ok(Experiment::new(self.metadata, spec))
    }

    /// Builds the experiment and creates it in its own namespace.
    pub fn submit(self, client: &mut dyn Client) -> Result<Experiment, SubmitError> {
        let experiment = self.build()?;
        let namespace = experiment
            .namespace()
            .cloned()
            .ok_or(BuildError::Missing("namespace"))?;
        info!(experiment = %experiment.name(), namespace = %namespace, "submitting experiment");
        Ok(client.create_experiment(&experiment, &namespace)?)
    }
}

/// Checks the structural rules of an experiment spec.
///
/// The search space must be non-empty with unique names and sound bounds.
/// Trial parameters and search space parameters must reference each other
/// one to one, every placeholder in the trial manifest must be declared,
/// and the trial counts must be positive with parallel not above max.
pub fn validate(spec: &ExperimentSpec) -> Result<(), BuildError> {
    if spec.algorithm.algorithm_name.trim().is_empty() {
        return Err(BuildError::Missing("algorithm name"));
    }
    if spec.objective.objective_metric_name.trim().is_empty() {
        return Err(BuildError::Missing("objective metric"));
    }
    validate_search_space(&spec.parameters)?;
    validate_trial_template(&spec.trial_template, &spec.parameters)?;
    validate_counts(spec)
}

fn validate_search_space(parameters: &[ParameterSpec]) -> Result<(), BuildError> {
    if parameters.is_empty() {
        return Err(BuildError::NoParameters);
    }
    let mut names = BTreeSet::new();
    for parameter in parameters {
        if !names.insert(parameter.name.as_str()) {
            return Err(BuildError::DuplicateParameter(parameter.name.clone()));
        }
        validate_feasible_space(parameter).map_err(|reason| BuildError::InvalidFeasibleSpace {
            name: parameter.name.clone(),
            reason,
        })?;
    }
    Ok(())
}

fn validate_feasible_space(parameter: &ParameterSpec) -> Result<(), String> {
    let space = &parameter.feasible_space;
    match parameter.parameter_type {
        ParameterType::Double | ParameterType::Int => {
            let (min, max) = match (&space.min, &space.max) {
                (Some(min), Some(max)) => (min, max),
                _ => return Err("both min and max are required".to_string()),
            };
            let integer = parameter.parameter_type == ParameterType::Int;
            let min_value = parse_bound(min, integer)?;
            let max_value = parse_bound(max, integer)?;
            if min_value >= max_value {
                return Err(format!("min {} is not below max {}", min, max));
            }
            if let Some(step) = &space.step {
                if parse_bound(step, integer)? <= 0.0 {
                    return Err(format!("step {} is not positive", step));
                }
            }
            Ok(())
        }
        ParameterType::Discrete => {
            if space.list.is_empty() {
                return Err("a list of values is required".to_string());
            }
            space.list.iter().try_for_each(|v| parse_bound(v, false).map(|_| ()))
        }
        ParameterType::Categorical => {
            if space.list.is_empty() {
                return Err("a list of values is required".to_string());
            }
            Ok(())
        }
    }
}

fn parse_bound(value: &str, integer: bool) -> Result<f64, String> {
    if integer {
        value
            .trim()
            .parse::<i64>()
            .map(|v| v as f64)
            .map_err(|_| format!("{:?} is not an integer", value))
    } else {
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(format!("{:?} is not finite", value)),
            Err(_) => Err(format!("{:?} is not a number", value)),
        }
    }
}

fn validate_trial_template(template: &TrialTemplate, parameters: &[ParameterSpec]) -> Result<(), BuildError> {
    let mut declared = BTreeSet::new();
    for trial_parameter in &template.trial_parameters {
        if !declared.insert(trial_parameter.name.as_str()) {
            return Err(BuildError::DuplicateTrialParameter(trial_parameter.name.clone()));
        }
        if !parameters.iter().any(|p| p.name == trial_parameter.reference) {
            return Err(BuildError::UnresolvedReference {
                name: trial_parameter.name.clone(),
                reference: trial_parameter.reference.clone(),
            });
        }
    }

    if let Some(unused) = parameters
        .iter()
        .find(|p| !template.trial_parameters.iter().any(|t| t.reference == p.name))
    {
        return Err(BuildError::UnusedParameter(unused.name.clone()));
    }

    let trial_spec = match (&template.trial_spec, &template.config_map) {
        (Some(trial_spec), _) => trial_spec,
        // the manifest lives in the cluster, placeholders are checked there
        (None, Some(_)) => return Ok(()),
        (None, None) => return Err(BuildError::Missing("trial template")),
    };
    if let Some(undeclared) = placeholders(trial_spec)
        .into_iter()
        .find(|name| !declared.contains(name.as_str()))
    {
        return Err(BuildError::UndeclaredPlaceholder(undeclared));
    }
    Ok(())
}

fn validate_counts(spec: &ExperimentSpec) -> Result<(), BuildError> {
    let max = positive(spec.max_trial_count, "max trial count")?;
    let parallel = positive(spec.parallel_trial_count, "parallel trial count")?;
    positive(spec.max_failed_trial_count, "max failed trial count")?;
    if parallel > max {
        return Err(BuildError::ParallelExceedsMax { parallel, max });
    }
    Ok(())
}

fn positive(count: Option<u32>, what: &'static str) -> Result<u32, BuildError> {
    match count {
        None => Err(BuildError::Missing(what)),
        Some(0) => Err(BuildError::NonPositiveCount(what)),
        Some(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{error::CreateError, experiment::ConfigMapSource},
        backend::memory::Memory,
        builder::placeholder,
    };

    fn mnist_job() -> JobTemplate {
        JobTemplate::new("training-container", "docker.io/kubeflowkatib/pytorch-mnist-cpu:v0.14.0").command(vec![
            "python3".to_string(),
            "/opt/pytorch-mnist/mnist.py".to_string(),
            "--epochs=1".to_string(),
            "--batch-size=64".to_string(),
            format!("--lr={}", placeholder("learningRate")),
            format!("--momentum={}", placeholder("momentum")),
        ])
    }

    fn cmaes() -> ExperimentBuilder {
        ExperimentBuilder::new("cmaes-example", "team-1")
            .algorithm(AlgorithmSpec::new("cmaes"))
            .minimize("loss", Some(0.001))
            .double_parameter("lr", "0.01", "0.06")
            .double_parameter("momentum", "0.5", "0.9")
            .trial_parameter("learningRate", "Learning rate for the training model", "lr")
            .trial_parameter("momentum", "Momentum for the training model", "momentum")
            .job(mnist_job())
            .trial_counts(3, 2, 1)
    }

    #[test]
    fn builds_cmaes_example() {
        let experiment = cmaes().build().unwrap();
        let spec = &experiment.spec;
        assert_eq!(experiment.kind, "Experiment");
        assert_eq!(experiment.api_version, "kubeflow.org/v1beta1");
        assert_eq!(experiment.namespace().unwrap().as_ref(), "team-1");
        assert_eq!(spec.parameters.len(), 2);
        assert_eq!(spec.objective.objective_type, ObjectiveType::Minimize);
        assert_eq!(spec.objective.goal, Some(0.001));

        let references: Vec<_> = spec
            .trial_template
            .trial_parameters
            .iter()
            .map(|t| t.reference.as_str())
            .collect();
        assert_eq!(references, vec!["lr", "momentum"]);
        assert_eq!(
            spec.trial_template.primary_container_name.as_deref(),
            Some("training-container")
        );
        assert_eq!((spec.max_trial_count, spec.parallel_trial_count), (Some(3), Some(2)));
    }

    #[test]
    fn bounds_are_preserved() {
        let bounds = [("0.01", "0.06"), ("0.5", "0.9"), ("1e-5", "1e-1"), ("-3.25", "7")];
        for (min, max) in bounds.iter() {
            let experiment = ExperimentBuilder::new("bounds", "team-1")
                .algorithm(AlgorithmSpec::new("random"))
                .minimize("loss", None)
                .double_parameter("x", min, max)
                .trial_parameter("x", "", "x")
                .trial_spec(None, serde_json::json!({ "args": [placeholder("x")] }))
                .trial_counts(1, 1, 1)
                .build()
                .unwrap();
            let space = &experiment.spec.parameters[0].feasible_space;
            assert_eq!(space.min.as_deref(), Some(*min));
            assert_eq!(space.max.as_deref(), Some(*max));
            assert!(min.parse::<f64>().unwrap() < max.parse::<f64>().unwrap());
        }
    }

    #[test]
    fn every_reference_resolves() {
        let experiment = cmaes().build().unwrap();
        for trial_parameter in &experiment.spec.trial_template.trial_parameters {
            assert!(experiment.spec.parameter(&trial_parameter.reference).is_some());
        }
    }

    #[test]
    fn rejects_parallel_above_max() {
        let error = cmaes().trial_counts(2, 3, 1).build().unwrap_err();
        assert_eq!(error, BuildError::ParallelExceedsMax { parallel: 3, max: 2 });
    }

    #[test]
    fn rejects_zero_counts() {
        assert_eq!(
            cmaes().trial_counts(0, 0, 1).build().unwrap_err(),
            BuildError::NonPositiveCount("max trial count")
        );
        assert_eq!(
            cmaes().trial_counts(3, 0, 1).build().unwrap_err(),
            BuildError::NonPositiveCount("parallel trial count")
        );
    }

    #[test]
    fn rejects_empty_search_space() {
        let error = ExperimentBuilder::new("empty", "team-1")
            .algorithm(AlgorithmSpec::new("cmaes"))
            .minimize("loss", None)
            .trial_spec(None, serde_json::json!({}))
            .trial_counts(1, 1, 1)
            .build()
            .unwrap_err();
        assert_eq!(error, BuildError::NoParameters);
    }

    #[test]
    fn rejects_unresolved_reference() {
        let error = cmaes()
            .trial_parameter("batchSize", "", "batch_size")
            .build()
            .unwrap_err();
        assert_eq!(
            error,
            BuildError::UnresolvedReference {
                name: "batchSize".to_string(),
                reference: "batch_size".to_string()
            }
        );
    }

    #[test]
    fn rejects_unreferenced_parameter() {
        let error = cmaes().int_parameter("epochs", "1", "5").build().unwrap_err();
        assert_eq!(error, BuildError::UnusedParameter("epochs".to_string()));
    }

    #[test]
    fn rejects_undeclared_placeholder() {
        let job = mnist_job().command(vec!["train", "--lr=${trialParameters.learningRate}", "--wd=${trialParameters.decay}"]);
        let error = cmaes().job(job).build().unwrap_err();
        assert_eq!(error, BuildError::UndeclaredPlaceholder("decay".to_string()));
    }

    #[test]
    fn rejects_inverted_or_unparsable_bounds() {
        let inverted = cmaes().double_parameter("wd", "0.9", "0.1").build().unwrap_err();
        assert!(matches!(inverted, BuildError::InvalidFeasibleSpace { ref name, .. } if name == "wd"));

        let garbage = ExperimentBuilder::new("e", "team-1")
            .algorithm(AlgorithmSpec::new("random"))
            .minimize("loss", None)
            .int_parameter("layers", "two", "4")
            .trial_parameter("layers", "", "layers")
            .trial_spec(None, serde_json::json!({}))
            .trial_counts(1, 1, 1)
            .build()
            .unwrap_err();
        assert!(matches!(garbage, BuildError::InvalidFeasibleSpace { .. }));
    }

    #[test]
    fn categorical_needs_values() {
        let empty: Vec<String> = Vec::new();
        let error = ExperimentBuilder::new("e", "team-1")
            .algorithm(AlgorithmSpec::new("random"))
            .maximize("accuracy", None)
            .categorical_parameter("optimizer", empty)
            .trial_parameter("optimizer", "", "optimizer")
            .trial_spec(None, serde_json::json!({}))
            .trial_counts(1, 1, 1)
            .build()
            .unwrap_err();
        assert!(matches!(error, BuildError::InvalidFeasibleSpace { .. }));
    }

    #[test]
    fn rejects_duplicates() {
        let error = cmaes().double_parameter("lr", "0.1", "0.2").build().unwrap_err();
        assert_eq!(error, BuildError::DuplicateParameter("lr".to_string()));

        let error = cmaes().trial_parameter("momentum", "", "momentum").build().unwrap_err();
        assert_eq!(error, BuildError::DuplicateTrialParameter("momentum".to_string()));
    }

    #[test]
    fn missing_pieces_are_reported() {
        let error = ExperimentBuilder::new("e", "team-1").build().unwrap_err();
        assert_eq!(error, BuildError::Missing("algorithm"));
    }

    #[test]
    fn invalid_experiment_is_never_sent() {
        let mut client = Memory::new();
        let result = cmaes().trial_counts(1, 2, 1).submit(&mut client);
        assert!(matches!(result, Err(SubmitError::Build(_))));
        assert!(client.is_empty());
    }

    #[test]
    fn submit_then_query() {
        let mut client = Memory::new();
        let created = cmaes().submit(&mut client).unwrap();
        let fetched = client.get_experiment(created.name(), &"team-1".into()).unwrap();
        assert_eq!(fetched.spec.parameters.len(), 2);

        let again = cmaes().submit(&mut client);
        assert!(matches!(again, Err(SubmitError::Create(CreateError::AlreadyExists(_)))));
    }

    #[test]
    fn rejects_non_finite_bounds() {
        for (min, max) in [("NaN", "1"), ("0", "NaN"), ("-inf", "1"), ("0", "inf")].iter() {
            let error = cmaes().double_parameter("wd", min, max).build().unwrap_err();
            assert!(
                matches!(error, BuildError::InvalidFeasibleSpace { ref name, .. } if name == "wd"),
                "{} {} gave {:?}",
                min,
                max,
                error
            );
        }
    }

    #[test]
    fn validate_requires_counts_on_fetched_specs() {
        let mut spec = cmaes().build().unwrap().spec;
        spec.max_trial_count = None;
        assert_eq!(validate(&spec).unwrap_err(), BuildError::Missing("max trial count"));
    }

    #[test]
    fn config_map_template_skips_placeholder_scan() {
        let mut spec = cmaes().build().unwrap().spec;
        spec.trial_template.trial_spec = None;
        assert_eq!(validate(&spec).unwrap_err(), BuildError::Missing("trial template"));

        spec.trial_template.config_map = Some(ConfigMapSource {
            config_map_name: Some("trial-templates".to_string()),
            config_map_namespace: Some("kubeflow".to_string()),
            template_path: Some("defaultTrialTemplate.yaml".to_string()),
        });
        assert!(validate(&spec).is_ok());
    }
}
