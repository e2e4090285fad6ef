//! Configuration sources.
//!
//! Two configurations live here:
//! - `AppConfig`, read by the container app from `PORT` and `MESSAGE`
//! - `ConfigSources`, which merges a JSON config file, environment variables
//!   and CLI flags into the raw bag the input validator consumes

use std::path::Path;

use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use crate::error::DeployError;
use crate::input::validate::keys;
use crate::input::{ConfigInput, RawConfig};

/// Environment prefix for deployment settings.
pub const ENV_PREFIX: &str = "CLOUDRUN_";

/// Raw key of the registry repository used to derive an image URL.
pub const IMAGE_REPOSITORY_KEY: &str = "imageRepository";

/// Runtime configuration of the container app, loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listen port; the platform injects `PORT`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Message served on `/`.
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_port() -> u16 {
    ConfigInput::DEFAULT_PORT
}

fn default_message() -> String {
    ConfigInput::DEFAULT_MESSAGE.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            message: default_message(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be between 1 and 65535".to_string());
        }
        Ok(())
    }
}

/// Deployment settings as given by one source.
///
/// Values stay strings; typing and range checks belong to the input validator.
#[derive(Debug, Clone, Default, Deserialize, Args)]
pub struct DeploySettings {
    /// Container image reference.
    #[arg(long)]
    pub image_url: Option<String>,

    /// Artifact Registry repository and image (`repo/image:tag`), used when no image URL is set.
    #[arg(long)]
    pub image_repository: Option<String>,

    /// Container port.
    #[arg(long)]
    pub container_port: Option<String>,

    /// CPU limit in cores.
    #[arg(long)]
    pub cpu: Option<String>,

    /// Memory limit, e.g. 512Mi or 1Gi.
    #[arg(long)]
    pub memory: Option<String>,

    /// Maximum concurrent requests per instance.
    #[arg(long)]
    pub concurrency: Option<String>,

    /// Message served by the container.
    #[arg(long)]
    pub message: Option<String>,

    /// Deployment region.
    #[arg(long)]
    pub location: Option<String>,

    /// Cloud project id.
    #[arg(long)]
    pub project: Option<String>,

    /// Grant public invocation (true/false).
    #[arg(long)]
    pub allow_unauthenticated: Option<String>,
}

impl DeploySettings {
    /// Load `CLOUDRUN_*` environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }

    fn entries(&self) -> [(&'static str, &Option<String>); 10] {
        [
            (keys::IMAGE_URL, &self.image_url),
            (IMAGE_REPOSITORY_KEY, &self.image_repository),
            (keys::CONTAINER_PORT, &self.container_port),
            (keys::CPU, &self.cpu),
            (keys::MEMORY, &self.memory),
            (keys::CONCURRENCY, &self.concurrency),
            (keys::MESSAGE, &self.message),
            (keys::LOCATION, &self.location),
            (keys::PROJECT, &self.project),
            (keys::ALLOW_UNAUTHENTICATED, &self.allow_unauthenticated),
        ]
    }

    fn overlay(&self, raw: &mut RawConfig) {
        for (key, value) in self.entries() {
            if let Some(value) = value {
                raw.insert(key.to_string(), Value::String(value.clone()));
            }
        }
    }
}

/// Provider-level fallbacks for project and region.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    /// `GOOGLE_CLOUD_PROJECT`.
    #[serde(default)]
    pub google_cloud_project: Option<String>,

    /// `GOOGLE_CLOUD_REGION`.
    #[serde(default)]
    pub google_cloud_region: Option<String>,
}

impl ProviderSettings {
    /// Load from environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

/// All configuration sources of one deployment invocation.
///
/// Precedence, lowest first: config file, `CLOUDRUN_*` variables, CLI flags.
/// Provider variables only fill `project` and `location` when the file
/// leaves them unset.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Parsed config file.
    pub file: Option<RawConfig>,
    /// Provider fallbacks.
    pub provider: ProviderSettings,
    /// `CLOUDRUN_*` variables.
    pub env: DeploySettings,
    /// Command line flags.
    pub cli: DeploySettings,
}

impl ConfigSources {
    /// Gather every source: the optional file, `.env`, the environment and `cli`.
    pub fn load(file: Option<&Path>, cli: DeploySettings) -> Result<Self, DeployError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            file: file.map(load_file).transpose()?,
            provider: ProviderSettings::from_env()?,
            env: DeploySettings::from_env()?,
            cli,
        })
    }

    /// Merge all sources into one raw bag.
    pub fn into_raw(self) -> RawConfig {
        let mut raw = self.file.unwrap_or_default();

        let provider = [
            (keys::PROJECT, self.provider.google_cloud_project),
            (keys::LOCATION, self.provider.google_cloud_region),
        ];
        for (key, value) in provider {
            let Some(value) = value else { continue };
            let present = raw.get(key).is_some_and(|v| match v {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            });
            if !present {
                raw.insert(key.to_string(), Value::String(value));
            }
        }

        self.env.overlay(&mut raw);
        self.cli.overlay(&mut raw);
        derive_image_url(&mut raw);
        raw
    }
}

/// Fill in `imageUrl` from the Artifact Registry repository when it is not set.
fn derive_image_url(raw: &mut RawConfig) {
    if raw.get(keys::IMAGE_URL).is_some_and(|v| !v.is_null()) {
        return;
    }

    let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::trim);
    let image = match (
        text(keys::LOCATION),
        text(keys::PROJECT),
        text(IMAGE_REPOSITORY_KEY),
    ) {
        (Some(location), Some(project), Some(repository))
            if !location.is_empty() && !project.is_empty() && !repository.is_empty() =>
        {
            format!("{location}-docker.pkg.dev/{project}/{repository}")
        }
        _ => return,
    };
    raw.insert(keys::IMAGE_URL.to_string(), Value::String(image));
}

/// Read a JSON config file whose top level is an object.
pub fn load_file(path: &Path) -> Result<RawConfig, DeployError> {
    let failed = |reason: String| DeployError::ConfigFile {
        path: path.display().to_string(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
    match serde_json::from_str::<Value>(&text).map_err(|e| failed(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(failed("expected a JSON object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(f: impl FnOnce(&mut DeploySettings)) -> DeploySettings {
        let mut s = DeploySettings::default();
        f(&mut s);
        s
    }

    #[test]
    fn app_defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.message, "Hello from Cloud Run!");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn app_rejects_port_zero() {
        let config = AppConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let file = json!({ "cpu": 1, "memory": "256Mi", "message": "from file" });
        let sources = ConfigSources {
            file: file.as_object().cloned(),
            provider: ProviderSettings::default(),
            env: settings(|s| {
                s.cpu = Some("2".to_string());
                s.message = Some("from env".to_string());
            }),
            cli: settings(|s| s.cpu = Some("4".to_string())),
        };

        let raw = sources.into_raw();
        assert_eq!(raw["cpu"], json!("4"));
        assert_eq!(raw["message"], json!("from env"));
        assert_eq!(raw["memory"], json!("256Mi"));
    }

    #[test]
    fn provider_variables_are_fallbacks() {
        let sources = ConfigSources {
            provider: ProviderSettings {
                google_cloud_project: Some("fallback".to_string()),
                google_cloud_region: Some("us-central1".to_string()),
            },
            env: settings(|s| s.project = Some("explicit".to_string())),
            ..Default::default()
        };

        let raw = sources.into_raw();
        assert_eq!(raw["project"], json!("explicit"));
        assert_eq!(raw["location"], json!("us-central1"));
    }

    #[test]
    fn config_file_beats_provider_variables() {
        let file = json!({ "project": "from-file" });
        let sources = ConfigSources {
            file: file.as_object().cloned(),
            provider: ProviderSettings {
                google_cloud_project: Some("ambient-shell-project".to_string()),
                google_cloud_region: Some("us-central1".to_string()),
            },
            ..Default::default()
        };

        let raw = sources.into_raw();
        assert_eq!(raw["project"], json!("from-file"));
        assert_eq!(raw["location"], json!("us-central1"));
    }

    #[test]
    fn image_url_is_derived_from_repository() {
        let sources = ConfigSources {
            cli: settings(|s| {
                s.location = Some("europe-west1".to_string());
                s.project = Some("demo".to_string());
                s.image_repository = Some("my-cloudrun-repo/my-app:latest".to_string());
            }),
            ..Default::default()
        };

        let raw = sources.into_raw();
        assert_eq!(
            raw["imageUrl"],
            json!("europe-west1-docker.pkg.dev/demo/my-cloudrun-repo/my-app:latest")
        );
    }

    #[test]
    fn explicit_image_url_is_kept() {
        let sources = ConfigSources {
            cli: settings(|s| {
                s.location = Some("europe-west1".to_string());
                s.project = Some("demo".to_string());
                s.image_url = Some("repo/img:latest".to_string());
                s.image_repository = Some("ignored/app".to_string());
            }),
            ..Default::default()
        };

        assert_eq!(sources.into_raw()["imageUrl"], json!("repo/img:latest"));
    }

    #[test]
    fn missing_config_file_names_path() {
        let err = load_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
