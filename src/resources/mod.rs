//! Declarative resource descriptions and the pure builder producing them.
//!
//! Nothing in here talks to an engine: `build` maps a validated
//! `ConfigInput` to the child specs of one Cloud Run component.

pub mod policy;
pub mod service;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::input::ConfigInput;

pub use policy::{AccessPolicySpec, ServiceRef, ALL_USERS, INVOKER_ROLE};
pub use service::{
    ContainerPort, ContainerSpec, EnvVar, ResourceRequirements, RevisionTemplate, ServiceSpec,
    MESSAGE_ENV,
};

/// Kind of a child resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResourceKind {
    /// Cloud Run service.
    Service,
    /// IAM invoker binding.
    AccessPolicy,
}

impl ResourceKind {
    /// Provider type token.
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::Service => "gcp:cloudrun/service:Service",
            ResourceKind::AccessPolicy => "gcp:cloudrun/iamMember:IamMember",
        }
    }
}

/// Any child resource description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceSpec {
    /// A service.
    Service(ServiceSpec),
    /// An access policy binding.
    AccessPolicy(AccessPolicySpec),
}

impl ResourceSpec {
    /// Kind of this spec.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Service(_) => ResourceKind::Service,
            ResourceSpec::AccessPolicy(_) => ResourceKind::AccessPolicy,
        }
    }

    /// Logical name of this spec.
    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::Service(s) => &s.name,
            ResourceSpec::AccessPolicy(p) => &p.name,
        }
    }
}

impl From<ServiceSpec> for ResourceSpec {
    fn from(spec: ServiceSpec) -> Self {
        ResourceSpec::Service(spec)
    }
}

impl From<AccessPolicySpec> for ResourceSpec {
    fn from(spec: AccessPolicySpec) -> Self {
        ResourceSpec::AccessPolicy(spec)
    }
}

/// Build the child specs of component `name`.
pub fn build(name: &str, input: &ConfigInput) -> (ServiceSpec, AccessPolicySpec) {
    let service_name = format!("{name}-service");

    let mut limits = std::collections::BTreeMap::new();
    limits.insert("cpu".to_string(), input.cpu.to_string());
    limits.insert("memory".to_string(), input.memory.to_string());

    let service = ServiceSpec {
        name: service_name.clone(),
        location: input.location.clone(),
        project: input.project.clone(),
        template: RevisionTemplate {
            containers: vec![ContainerSpec {
                image: input.image_url.clone(),
                ports: vec![ContainerPort {
                    container_port: input.container_port,
                }],
                resources: ResourceRequirements { limits },
                envs: vec![EnvVar::new(MESSAGE_ENV, input.message.clone())],
            }],
            container_concurrency: input.concurrency,
        },
    };

    let policy = AccessPolicySpec {
        name: format!("{name}-invoker"),
        location: input.location.clone(),
        project: input.project.clone(),
        service: ServiceRef::Pending(service_name),
        role: INVOKER_ROLE.to_string(),
        member: ALL_USERS.to_string(),
    };

    (service, policy)
}
