use crate::{
    api::{
        client::Client,
        error::{CreateError, DeleteError, GetError, RemoteError},
        experiment::Experiment,
    },
    ExperimentName, Namespace,
};
use anyhow::anyhow;
use std::collections::BTreeMap;
use tracing::debug;

/// A [`Client`] keeping experiments in memory.
///
/// Handy for dry runs. It follows the API server's rules for names and
/// namespaces but never schedules trials, so stored experiments carry no status.
#[derive(Debug, Default)]
pub struct Memory {
    experiments: BTreeMap<(Namespace, ExperimentName), Experiment>,
}

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

impl Client for Memory {
    fn create_experiment(&mut self, experiment: &Experiment, namespace: &Namespace) -> Result<Experiment, CreateError> {
        if let Some(declared) = experiment.namespace() {
            if declared != namespace {
                return Err(CreateError::Remote(anyhow!(
                    "the namespace of the experiment ({}) does not match the request namespace ({})",
                    declared,
                    namespace
                )));
            }
        }

        let key = (namespace.clone(), experiment.name().clone());
        if self.experiments.contains_key(&key) {
            return Err(CreateError::AlreadyExists(experiment.name().to_string()));
        }

        let mut stored = experiment.clone();
        stored.metadata.namespace = Some(namespace.clone());
        stored.status = None;
        debug!(experiment = %stored.name(), namespace = %namespace, "stored experiment");
        self.experiments.insert(key, stored.clone());
        Ok(stored)
    }

    fn get_experiment(&mut self, name: &ExperimentName, namespace: &Namespace) -> Result<Experiment, GetError> {
        self.experiments
            .get(&(namespace.clone(), name.clone()))
            .cloned()
            .ok_or_else(|| GetError::DoesNotExist(name.to_string()))
    }

    fn list_experiments(&mut self, namespace: &Namespace) -> Result<Vec<Experiment>, RemoteError> {
        Ok(self
            .experiments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, experiment)| experiment.clone())
            .collect())
    }

    fn delete_experiment(&mut self, name: &ExperimentName, namespace: &Namespace) -> Result<(), DeleteError> {
        self.experiments
            .remove(&(namespace.clone(), name.clone()))
            .map(|_| ())
            .ok_or_else(|| GetError::DoesNotExist(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Memory;
    use crate::{
        api::{
            error::{CreateError, GetError},
            experiment::{AlgorithmSpec, ObjectiveSpec, ObjectiveType},
        },
        Client, ExperimentBuilder, JobTemplate,
    };

    fn experiment(name: &str, namespace: &str) -> crate::Experiment {
        let job = JobTemplate::new("training-container", "docker.io/busybox")
            .command(vec!["echo", "${trialParameters.learningRate}"]);
        ExperimentBuilder::new(name, namespace)
            .algorithm(AlgorithmSpec::new("random"))
            .objective(ObjectiveSpec::new(ObjectiveType::Minimize, "loss"))
            .double_parameter("lr", "0.01", "0.06")
            .trial_parameter("learningRate", "Learning rate", "lr")
            .job(job)
            .trial_counts(3, 2, 1)
            .build()
            .unwrap()
    }

    #[test]
    fn create_then_get() {
        let mut client = Memory::new();
        let submitted = experiment("e1", "team-1");
        let created = client.create_experiment(&submitted, &"team-1".into()).unwrap();
        assert_eq!(created, submitted);

        let fetched = client.get_experiment(&"e1".into(), &"team-1".into()).unwrap();
        assert_eq!(fetched.spec, submitted.spec);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut client = Memory::new();
        let submitted = experiment("e1", "team-1");
        client.create_experiment(&submitted, &"team-1".into()).unwrap();
        match client.create_experiment(&submitted, &"team-1".into()) {
            Err(CreateError::AlreadyExists(name)) => assert_eq!(name, "e1"),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn namespace_mismatch_is_a_remote_error() {
        let mut client = Memory::new();
        let submitted = experiment("e1", "team-1");
        let result = client.create_experiment(&submitted, &"team-2".into());
        assert!(matches!(result, Err(CreateError::Remote(_))));
        assert!(client.is_empty());
    }

    #[test]
    fn missing_experiment_is_not_found() {
        let mut client = Memory::new();
        match client.get_experiment(&"nope".into(), &"team-1".into()) {
            Err(GetError::DoesNotExist(name)) => assert_eq!(name, "nope"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn list_is_scoped_to_namespace() {
        let mut client = Memory::new();
        client.create_experiment(&experiment("a", "team-1"), &"team-1".into()).unwrap();
        client.create_experiment(&experiment("b", "team-1"), &"team-1".into()).unwrap();
        client.create_experiment(&experiment("a", "team-2"), &"team-2".into()).unwrap();

        let names: Vec<String> = client
            .list_experiments(&"team-1".into())
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn delete_removes_experiment() {
        let mut client = Memory::new();
        client.create_experiment(&experiment("a", "team-1"), &"team-1".into()).unwrap();
        client.delete_experiment(&"a".into(), &"team-1".into()).unwrap();
        assert!(client.is_empty());
        assert!(matches!(
            client.delete_experiment(&"a".into(), &"team-1".into()),
            Err(GetError::DoesNotExist(_))
        ));
    }
}
