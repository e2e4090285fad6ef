//! Cloud Run service description.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Environment variable the container app reads its message from.
pub const MESSAGE_ENV: &str = "MESSAGE";

/// Desired state of a Cloud Run service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Logical resource name.
    pub name: String,
    /// Region.
    pub location: String,
    /// Cloud project id.
    pub project: String,
    /// Revision template.
    pub template: RevisionTemplate,
}

/// Revision template of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
    /// Containers, exactly one for this component.
    pub containers: Vec<ContainerSpec>,
    /// Maximum concurrent requests per instance.
    pub container_concurrency: u32,
}

/// One container in a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Image reference.
    pub image: String,
    /// Ingress ports.
    pub ports: Vec<ContainerPort>,
    /// Resource limits.
    pub resources: ResourceRequirements,
    /// Environment variables.
    pub envs: Vec<EnvVar>,
}

/// Container ingress port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port number.
    pub container_port: u16,
}

/// Resource limits keyed by resource name (`cpu`, `memory`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Limits, ordered for stable output.
    pub limits: BTreeMap<String, String>,
}

/// Environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvVar {
    /// Create a new env var.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl ServiceSpec {
    /// The single container of this service, if present.
    pub fn container(&self) -> Option<&ContainerSpec> {
        self.template.containers.first()
    }

    /// Value of an environment variable on the first container.
    pub fn env(&self, name: &str) -> Option<&str> {
        self.container()?
            .envs
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }
}
