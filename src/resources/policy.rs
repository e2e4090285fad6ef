//! Invoker access policy binding.

use serde::{Deserialize, Serialize};

/// Role allowing invocation of a Cloud Run service.
pub const INVOKER_ROLE: &str = "roles/run.invoker";

/// Principal matching every caller, authenticated or not.
pub const ALL_USERS: &str = "allUsers";

/// Binding that grants `member` the `role` on a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicySpec {
    /// Logical resource name.
    pub name: String,
    /// Region of the bound service.
    pub location: String,
    /// Cloud project id.
    pub project: String,
    /// The service this policy applies to.
    pub service: ServiceRef,
    /// Granted role.
    pub role: String,
    /// Principal receiving the role.
    pub member: String,
}

/// Reference to the bound service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "camelCase")]
pub enum ServiceRef {
    /// Logical name of a service in the same plan; not yet created.
    Pending(String),
    /// Concrete identity allocated by the engine.
    Resolved(String),
}

impl AccessPolicySpec {
    /// Bind this policy to the identity the engine allocated for its service.
    pub fn for_service(self, service_id: impl Into<String>) -> Self {
        Self {
            service: ServiceRef::Resolved(service_id.into()),
            ..self
        }
    }

    /// Whether the policy targets a concrete service.
    pub fn is_bound(&self) -> bool {
        matches!(self.service, ServiceRef::Resolved(_))
    }
}
