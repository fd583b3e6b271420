use crate::{
    api::{
        client::Client,
        error::{CreateError, DeleteError, GetError, RemoteError},
        experiment::Experiment,
        resource,
    },
    ExperimentName, Namespace, ServerConfig,
};
use anyhow::{Context, Error};
use serde::{de::DeserializeOwned, Deserialize};
use std::fmt::Display;
use tracing::{debug, info, warn};

/// Failure body of the Kubernetes API, a `Status` object.
#[derive(Deserialize)]
struct RestErrorResponse {
    pub reason: StatusReason,
    #[serde(default)]
    pub message: String,
}
#[derive(Debug, Clone, thiserror::Error)]
pub enum RestError {
    #[error("{status} {reason}: {message}")]
    Known { status: u16, reason: StatusReason, message: String },
    #[error("Unknown {status} error:\n{body}")]
    Unknown { status: u16, body: String },
    #[error("could not reach the Kubernetes API: {0}")]
    Transport(String),
}
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum StatusReason {
    AlreadyExists,
    NotFound,
    Invalid,
    BadRequest,
    Unauthorized,
    Forbidden,
    Unknown(String),
}
impl From<String> for StatusReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "AlreadyExists" => StatusReason::AlreadyExists,
            "NotFound" => StatusReason::NotFound,
            "Invalid" => StatusReason::Invalid,
            "BadRequest" => StatusReason::BadRequest,
            "Unauthorized" => StatusReason::Unauthorized,
            "Forbidden" => StatusReason::Forbidden,
            _ => StatusReason::Unknown(value),
        }
    }
}
impl Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusReason::Unknown(reason) => f.write_str(reason),
            known => write!(f, "{:?}", known),
        }
    }
}

/// A Katib client speaking to the Kubernetes API server.
pub struct Server {
    config: ServerConfig,
}

fn parse_error(response: ureq::Response) -> RestError {
    let status = response.status();
    let synthetic = response.synthetic();
    let body = response
        .into_string()
        .unwrap_or_else(|_| "Could not turn error body into String.".to_string());

    if synthetic {
        RestError::Transport(body)
    } else {
        parse_error_body(status, body)
    }
}

fn parse_error_body(status: u16, body: String) -> RestError {
    let response = serde_json::from_str::<RestErrorResponse>(&body).ok();
    if let Some(response) = response {
        RestError::Known {
            status,
            reason: response.reason,
            message: response.message,
        }
    } else {
        RestError::Unknown { status, body }
    }
}

fn experiments_path(namespace: &Namespace) -> String {
    format!(
        "apis/{}/{}/namespaces/{}/{}",
        resource::GROUP,
        resource::VERSION,
        namespace.as_ref(),
        resource::PLURAL
    )
}

fn experiment_path(name: &ExperimentName, namespace: &Namespace) -> String {
    format!("{}/{}", experiments_path(namespace), name.as_ref())
}

impl Server {
    /// Create a `Server` for a Kubernetes API.
    ///
    /// The `url` should be something like `http://127.0.0.1:8001`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Server::with_config(ServerConfig::new(api_url))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Server { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn execute<Ep, Val, Hand, Err>(&mut self, request: Ep, error_handler: Hand) -> Result<Val, Err>
    where
        Ep: Endpoint<Value = Val> + EndpointExt,
        Hand: FnOnce(RestError) -> Err,
        Err: From<anyhow::Error>,
    {
        let url = format!("{}/{}", self.config.api_url, request.path());
        let body = request.body().context("serializing request failed")?;

        let mut http_request = Ep::METHOD(&url);
        http_request.set("Accept", "application/json");
        if let Some(token) = &self.config.token {
            http_request.set("Authorization", &format!("Bearer {}", token));
        }
        debug!(method = Ep::VERB, url = %url, "sending request");
        let http_response = match body {
            Some(body) => http_request
                .set("Content-Type", "application/json")
                .send_string(&body),
            None => http_request.call(),
        };

        if http_response.error() {
            let error = parse_error(http_response);
            warn!(method = Ep::VERB, url = %url, %error, "request failed");
            Err(error_handler(error))
        } else {
            debug!(status = http_response.status(), "request succeeded");
            let response_string = http_response.into_string().context("failed to turn response into string")?;
            let response = Ep::read_response_string(&response_string)
                .with_context(|| format!("deserializing response failed:\n{}", &response_string))?;
            let value = Ep::extract(response);
            Ok(value)
        }
    }
}

impl Client for Server {
    fn create_experiment(&mut self, experiment: &Experiment, namespace: &Namespace) -> Result<Experiment, CreateError> {
        let request = CreateExperiment { experiment, namespace };
        let name = experiment.name();
        let created = self.execute(request, |error| match error {
            RestError::Known {
                reason: StatusReason::AlreadyExists,
                ..
            } => CreateError::AlreadyExists(name.to_string()),
            _ => CreateError::Remote(error.into()),
        })?;
        info!(experiment = %name, namespace = %namespace, "experiment created");
        Ok(created)
    }

    fn get_experiment(&mut self, name: &ExperimentName, namespace: &Namespace) -> Result<Experiment, GetError> {
        let request = GetExperiment { name, namespace };
        self.execute(request, |error| not_found(error, name))
    }

    fn list_experiments(&mut self, namespace: &Namespace) -> Result<Vec<Experiment>, RemoteError> {
        let request = ListExperiments { namespace };
        self.execute(request, RemoteError::from)
    }

    fn delete_experiment(&mut self, name: &ExperimentName, namespace: &Namespace) -> Result<(), DeleteError> {
        let request = DeleteExperiment { name, namespace };
        self.execute(request, |error| not_found(error, name))?;
        info!(experiment = %name, namespace = %namespace, "experiment deleted");
        Ok(())
    }
}

fn not_found(error: RestError, name: &ExperimentName) -> GetError {
    match error {
        RestError::Known {
            reason: StatusReason::NotFound,
            ..
        } => GetError::DoesNotExist(name.to_string()),
        _ => GetError::Remote(error.into()),
    }
}

trait Endpoint {
    const METHOD: fn(&str) -> ureq::Request;
    const VERB: &'static str;

    type Response;
    type Value;

    fn path(&self) -> String;

    fn body(&self) -> Result<Option<String>, Error> {
        Ok(None)
    }

    fn extract(response: Self::Response) -> Self::Value;
}
trait VoidEndpoint {
    const METHOD: fn(&str) -> ureq::Request;
    const VERB: &'static str;

    fn path(&self) -> String;
}
trait EndpointExt: Endpoint {
    fn read_response_string(response: &str) -> Result<Self::Response, Error>;
}
impl<E> Endpoint for E
where
    E: VoidEndpoint,
{
    const METHOD: fn(&str) -> ureq::Request = E::METHOD;
    const VERB: &'static str = E::VERB;

    type Response = VoidResponse;
    type Value = ();

    fn path(&self) -> String {
        VoidEndpoint::path(self)
    }

    fn extract(_response: Self::Response) -> Self::Value {}
}
impl<P, R> EndpointExt for P
where
    R: DeserializeOwned,
    P: Endpoint<Response = R>,
{
    fn read_response_string(response: &str) -> Result<Self::Response, Error> {
        let response = serde_json::from_str::<'_, R>(response)?;
        Ok(response)
    }
}

#[derive(Deserialize)]
struct VoidResponse {}

#[derive(Debug, Clone, Copy)]
struct CreateExperiment<'a> {
    experiment: &'a Experiment,
    namespace: &'a Namespace,
}
impl Endpoint for CreateExperiment<'_> {
    const METHOD: fn(&str) -> ureq::Request = ureq::post;
    const VERB: &'static str = "POST";
    type Response = Experiment;
    type Value = Experiment;

    fn path(&self) -> String {
        experiments_path(self.namespace)
    }

    fn body(&self) -> Result<Option<String>, Error> {
        Ok(Some(serde_json::to_string(self.experiment)?))
    }

    fn extract(response: Self::Response) -> Self::Value {
        response
    }
}

#[derive(Debug, Clone, Copy)]
struct GetExperiment<'a> {
    name: &'a ExperimentName,
    namespace: &'a Namespace,
}
impl Endpoint for GetExperiment<'_> {
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    const VERB: &'static str = "GET";
    type Response = Experiment;
    type Value = Experiment;

    fn path(&self) -> String {
        experiment_path(self.name, self.namespace)
    }

    fn extract(response: Self::Response) -> Self::Value {
        response
    }
}

#[derive(Debug, Clone, Copy)]
struct ListExperiments<'a> {
    namespace: &'a Namespace,
}
#[derive(Deserialize)]
struct ListExperimentsResponse {
    #[serde(default)]
    items: Vec<Experiment>,
}
impl Endpoint for ListExperiments<'_> {
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    const VERB: &'static str = "GET";
    type Response = ListExperimentsResponse;
    type Value = Vec<Experiment>;

    fn path(&self) -> String {
        experiments_path(self.namespace)
    }

    fn extract(response: Self::Response) -> Self::Value {
        response.items
    }
}

#[derive(Debug, Clone, Copy)]
struct DeleteExperiment<'a> {
    name: &'a ExperimentName,
    namespace: &'a Namespace,
}
impl VoidEndpoint for DeleteExperiment<'_> {
    const METHOD: fn(&str) -> ureq::Request = ureq::delete;
    const VERB: &'static str = "DELETE";

    fn path(&self) -> String {
        experiment_path(self.name, self.namespace)
    }
}
