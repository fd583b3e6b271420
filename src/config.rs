use anyhow::{Context, Result};
use std::{env, fs, path::Path};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8001";
const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Where the Kubernetes API serving the Katib resources lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base url without the `/apis/...` suffix, like `http://127.0.0.1:8001`.
    pub api_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
}

impl ServerConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        ServerConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Reads `KATIB_API_URL` and `KATIB_TOKEN`.
    ///
    /// Without `KATIB_API_URL` this points at a local `kubectl proxy`.
    pub fn from_env() -> Self {
        Self::from_vars(env::var("KATIB_API_URL").ok(), env::var("KATIB_TOKEN").ok())
    }

    fn from_vars(api_url: Option<String>, token: Option<String>) -> Self {
        let config = ServerConfig::new(api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()));
        match token {
            Some(token) if !token.is_empty() => config.with_token(token),
            _ => config,
        }
    }

    /// Configuration for a pod talking to its own cluster.
    pub fn in_cluster() -> Result<Self> {
        Self::in_cluster_with_token_file(SERVICE_ACCOUNT_TOKEN)
    }

    fn in_cluster_with_token_file(token_file: impl AsRef<Path>) -> Result<Self> {
        let host = env::var("KUBERNETES_SERVICE_HOST").context("KUBERNETES_SERVICE_HOST is not set")?;
        let port = env::var("KUBERNETES_SERVICE_PORT").context("KUBERNETES_SERVICE_PORT is not set")?;
        let token_file = token_file.as_ref();
        let token = fs::read_to_string(token_file)
            .with_context(|| format!("failed to read service account token {}", token_file.display()))?;
        Ok(ServerConfig::new(format!("https://{}:{}", host, port)).with_token(token.trim()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new(DEFAULT_API_URL)
    }
}
