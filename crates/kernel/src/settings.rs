use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSHELF";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub shelves: ShelfSettings,
    #[serde(default)]
    pub browse: BrowseSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay and
    /// `BOOKSHELF_*` variables (`__` separates nested keys).
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let environment: Environment = environment.parse()?;

        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, environment)
    }

    /// Load configuration from an explicit directory for the given environment.
    pub fn load_from(config_dir: &std::path::Path, environment: Environment) -> anyhow::Result<Self> {
        let env_name = match environment {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", env_name));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The selected environment wins over anything found in the files.
        settings.environment = environment;
        settings.validate()?;

        Ok(settings)
    }

    /// Reject values that would leave the service unable to answer any request.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shelves.store_call_timeout_ms == 0 {
            anyhow::bail!("shelves.store_call_timeout_ms must be greater than zero");
        }
        if self.server.request_timeout_ms == 0 {
            anyhow::bail!("server.request_timeout_ms must be greater than zero");
        }
        if self.browse.limit == 0 {
            anyhow::bail!("browse.limit must be greater than zero");
        }
        if self.browse.store_call_timeout_ms == 0 {
            anyhow::bail!("browse.store_call_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Which Shelf Store backend to talk to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgrest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "StoreSettings::default_url")]
    pub url: String,
    /// Service key sent as `apikey` and bearer token. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "StoreSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl StoreSettings {
    fn default_url() -> String {
        "http://127.0.0.1:54321".to_string()
    }

    fn default_request_timeout_ms() -> u64 {
        10000
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: Self::default_url(),
            api_key: None,
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Header carrying the authenticated user id, set by the upstream session layer.
    #[serde(default = "AuthSettings::default_user_header")]
    pub user_header: String,
}

impl AuthSettings {
    fn default_user_header() -> String {
        "x-user-id".to_string()
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            user_header: Self::default_user_header(),
        }
    }
}

/// How `add` decides that a book is already on a shelf.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Same title and the stored authors contain every requested author.
    #[default]
    Contains,
    /// Same title and the same set of authors.
    Exact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfSettings {
    #[serde(default)]
    pub dedup: DedupMode,
    #[serde(default = "ShelfSettings::default_store_call_timeout_ms")]
    pub store_call_timeout_ms: u64,
}

impl ShelfSettings {
    fn default_store_call_timeout_ms() -> u64 {
        5000
    }
}

impl Default for ShelfSettings {
    fn default() -> Self {
        Self {
            dedup: DedupMode::default(),
            store_call_timeout_ms: Self::default_store_call_timeout_ms(),
        }
    }
}

/// Public catalog browsing (recommended list and its filters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseSettings {
    /// Most books returned by the recommended list and by a filtered list.
    #[serde(default = "BrowseSettings::default_limit")]
    pub limit: usize,
    #[serde(default = "BrowseSettings::default_store_call_timeout_ms")]
    pub store_call_timeout_ms: u64,
}

impl BrowseSettings {
    fn default_limit() -> usize {
        100
    }

    fn default_store_call_timeout_ms() -> u64 {
        5000
    }
}

impl Default for BrowseSettings {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
            store_call_timeout_ms: Self::default_store_call_timeout_ms(),
        }
    }
}
