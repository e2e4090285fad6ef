//! Seam to the external orchestration engine.
//!
//! The engine owns create/update/destroy semantics and state. Components
//! only register themselves, submit specs with parent and dependency edges,
//! and receive handles whose status settles later.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deferred::Deferred;
use crate::error::EngineError;
use crate::outputs::OutputRecord;
use crate::resources::{ResourceKind, ResourceSpec};

pub use memory::{MemoryEngine, MemoryEngineConfig, RegisteredResource, SettleMode};

/// Unique name the engine assigns to a registered component or resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Urn(String);

impl Urn {
    /// Build the URN for `name` of type `type_token`.
    pub fn new(type_token: &str, name: &str) -> Self {
        Self(format!("urn:engine::{type_token}::{name}"))
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a service's reported status list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    /// Public URL of the service.
    pub url: String,
    /// Latest revision that became ready.
    #[serde(default)]
    pub latest_ready_revision: Option<String>,
}

impl StatusEntry {
    /// Status entry with only a URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            latest_ready_revision: None,
        }
    }
}

/// Edges declared alongside a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Owning component; the engine tears the child down with it.
    pub parent: Option<Urn>,
    /// Resources that must exist before this one.
    pub depends_on: Vec<Urn>,
}

impl SubmitOptions {
    /// Options with a parent edge only.
    pub fn child_of(parent: &Urn) -> Self {
        Self {
            parent: Some(parent.clone()),
            depends_on: Vec::new(),
        }
    }

    /// Add an ordering dependency.
    pub fn depends_on(mut self, urn: &Urn) -> Self {
        self.depends_on.push(urn.clone());
        self
    }
}

/// Live reference to a submitted resource.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    /// Engine URN.
    pub urn: Urn,
    /// Concrete identity allocated by the engine.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Status list, available once the engine settles the resource.
    pub statuses: Deferred<Vec<StatusEntry>>,
}

/// External orchestration engine.
#[async_trait]
pub trait ResourceEngine: Send + Sync {
    /// Register a named component that will own child resources.
    async fn register_component(&self, type_token: &str, name: &str) -> Result<Urn, EngineError>;

    /// Submit a child resource spec.
    ///
    /// Returns once the engine has accepted the spec and allocated an
    /// identity; the returned status may still be pending.
    async fn submit(
        &self,
        spec: ResourceSpec,
        options: SubmitOptions,
    ) -> Result<ResourceHandle, EngineError>;

    /// Attach the component's outputs to its registration.
    async fn register_outputs(&self, urn: &Urn, outputs: &OutputRecord)
        -> Result<(), EngineError>;

    /// Destroy a component or resource together with everything it owns.
    ///
    /// Returns the number of removed registrations.
    async fn destroy(&self, urn: &Urn) -> Result<usize, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_embeds_type_and_name() {
        let urn = Urn::new("custom:index:CloudRunService", "app");
        assert_eq!(urn.as_str(), "urn:engine::custom:index:CloudRunService::app");
        assert_eq!(urn.to_string(), urn.as_str());
    }

    #[test]
    fn submit_options_collect_edges() {
        let parent = Urn::new("t", "p");
        let dep = Urn::new("t", "d");
        let opts = SubmitOptions::child_of(&parent).depends_on(&dep);
        assert_eq!(opts.parent, Some(parent));
        assert_eq!(opts.depends_on, vec![dep]);
    }
}
