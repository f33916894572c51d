use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{identity::HostedIdentityClient, transport::RealtimeProtocol};

pub const DEFAULT_SETTINGS_FILE: &str = "todo_settings.json";
pub const ENV_PREFIX: &str = "TODO_APP";

/// Backend configuration produced by the deployment tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub user_pool_id: String,
    #[serde(default)]
    pub user_pool_client_id: String,
    #[serde(default)]
    pub graphql_endpoint: String,
    #[serde(default)]
    pub realtime_endpoint: Option<String>,
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    /// `appsync` or `graphql-transport-ws`; picked from the endpoint hosts
    /// when absent.
    #[serde(default)]
    pub realtime_protocol: Option<RealtimeProtocol>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file {} was not found", path.display())]
    Missing { path: PathBuf },
    #[error("settings file {} could not be read: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("settings key `{field}` is missing or blank")]
    Incomplete { field: &'static str },
    #[error("settings key `{field}` is not a valid URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
}

impl ConfigError {
    /// Operator-facing hint shown on the configuration-error screen.
    pub fn remediation(&self) -> String {
        match self {
            ConfigError::Missing { path } => format!(
                "Deploy the backend and copy its generated settings to {}, \
                 or pass --settings <path>.",
                path.display()
            ),
            ConfigError::Malformed { .. } => {
                "The settings file must be a JSON object; regenerate it from the backend deployment."
                    .to_string()
            }
            ConfigError::Incomplete { field } => format!(
                "Add a non-empty `{field}` to the settings file or set {ENV_PREFIX}__{}.",
                field.to_ascii_uppercase()
            ),
            ConfigError::InvalidUrl { field, .. } => {
                format!("`{field}` must be an absolute http(s) or ws(s) URL.")
            }
        }
    }
}

/// Picks the settings file: an explicit path wins, then the working
/// directory, then `<config_dir>/todo_app/`. Falls back to the working
/// directory path so a missing file is reported there.
pub fn resolve_settings_path(explicit: Option<&Path>, config_dir: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(DEFAULT_SETTINGS_FILE);
    if local.is_file() {
        return local;
    }
    config_dir
        .map(|dir| dir.join("todo_app").join(DEFAULT_SETTINGS_FILE))
        .filter(|path| path.is_file())
        .unwrap_or(local)
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }

    let settings: Settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .and_then(Config::try_deserialize)
        .map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("region", &self.region),
            ("user_pool_id", &self.user_pool_id),
            ("user_pool_client_id", &self.user_pool_client_id),
            ("graphql_endpoint", &self.graphql_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Incomplete { field });
            }
        }
        self.graphql_url()?;
        self.realtime_url()?;
        self.identity_url()?;
        Ok(())
    }

    pub fn graphql_url(&self) -> Result<Url, ConfigError> {
        parse_url("graphql_endpoint", &self.graphql_endpoint)
    }

    pub fn realtime_url(&self) -> Result<Option<Url>, ConfigError> {
        optional_url("realtime_endpoint", self.realtime_endpoint.as_deref())
    }

    /// Falls back to the regional user-pool endpoint.
    pub fn identity_url(&self) -> Result<Url, ConfigError> {
        match optional_url("identity_endpoint", self.identity_endpoint.as_deref())? {
            Some(url) => Ok(url),
            None => HostedIdentityClient::regional_endpoint(self.region.trim())
                .map_err(|source| ConfigError::InvalidUrl {
                    field: "region",
                    source,
                }),
        }
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn optional_url(field: &'static str, raw: Option<&str>) -> Result<Option<Url>, ConfigError> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => parse_url(field, value).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
