use serde_aux::field_attributes::deserialize_number_from_string;
use std::convert::{TryFrom, TryInto};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub github: GithubSettings,
    pub enumeration: EnumerationSettings,
    pub output: OutputSettings,
    pub pipeline: PipelineSettings,
}

/// How to reach the GitHub REST API, and on whose behalf.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct GithubSettings {
    pub base_url: String,
    /// The user or organization that owns the repositories.
    pub account: String,
    pub user_agent: String,
    /// Name of the environment variable holding the access token.
    pub token_env_var: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_retries: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub retry_backoff_millis: u64,
}

impl GithubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_millis)
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationMode {
    /// Ask the listing endpoint for every repository of the account.
    Dynamic,
    /// Use the configured list of repositories as-is.
    Static,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct EnumerationSettings {
    pub mode: EnumerationMode,
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `{root}/{repo}/traffic_{repo}_{date}.csv`
    PerResource,
    /// `{root}/traffic_{repo}_{date}.csv`
    Flat,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct OutputSettings {
    pub root_dir: PathBuf,
    pub layout: OutputLayout,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PipelineSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_concurrent_fetches: usize,
}

/// The possible runtime environment for our application.
#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

/// Environment variables such as `APP_GITHUB__ACCOUNT=octo-org` override the files.
pub fn environment_overrides() -> config::Environment {
    config::Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("enumeration.repositories")
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    // Detect the running environment, defaulting to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    load_configuration(
        &configuration_directory,
        environment,
        environment_overrides(),
    )
}

/// Layers `base.yaml`, then the optional environment-specific file, then `overrides`.
pub fn load_configuration(
    configuration_directory: &Path,
    environment: Environment,
    overrides: config::Environment,
) -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(overrides)
        .build()?
        .try_deserialize()
}
