//! In-process resource engine.
//!
//! Keeps registrations in memory, allocates identities and settles service
//! status locally. Used by `preview` and by tests; it never talks to a cloud
//! provider.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, instrument};

use super::{ResourceEngine, ResourceHandle, StatusEntry, SubmitOptions, Urn};
use crate::deferred::{Deferred, Settled};
use crate::error::{EngineError, OutputError};
use crate::outputs::OutputRecord;
use crate::resources::{AccessPolicySpec, ResourceKind, ResourceSpec, ServiceRef, ServiceSpec};

/// When submitted services settle their status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettleMode {
    /// Status resolves as soon as it is awaited.
    #[default]
    Immediate,
    /// Status stays pending until [`MemoryEngine::settle`] or [`MemoryEngine::fail`].
    Manual,
}

/// Configuration for memory engine behavior.
#[derive(Debug, Clone)]
pub struct MemoryEngineConfig {
    /// Reject every submission of this kind.
    pub reject_kind: Option<ResourceKind>,
    /// Settle services with an empty status list.
    pub empty_status: bool,
    /// Settle services with a failure.
    pub fail_status: bool,
    /// Settlement mode.
    pub settle: SettleMode,
    /// Domain service URLs are minted under.
    pub url_domain: String,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        Self {
            reject_kind: None,
            empty_status: false,
            fail_status: false,
            settle: SettleMode::Immediate,
            url_domain: "run.app".to_string(),
            latency_ms: 0,
        }
    }
}

/// A component or resource known to the engine.
#[derive(Debug, Clone)]
pub struct RegisteredResource {
    /// Engine URN.
    pub urn: Urn,
    /// Registration order.
    pub seq: u64,
    /// Type token.
    pub type_token: String,
    /// Logical name.
    pub name: String,
    /// Allocated identity; components have none.
    pub id: Option<String>,
    /// Owning component.
    pub parent: Option<Urn>,
    /// Declared ordering dependencies.
    pub depends_on: Vec<Urn>,
    /// Submitted spec; components have none.
    pub spec: Option<ResourceSpec>,
    /// Registered output names.
    pub outputs: Vec<String>,
}

type StatusSender = oneshot::Sender<Settled<Vec<StatusEntry>>>;

/// In-memory resource engine.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    /// Engine configuration.
    config: MemoryEngineConfig,
    /// Registrations by URN.
    resources: Arc<DashMap<Urn, RegisteredResource>>,
    /// Service identity to URN.
    ids: Arc<DashMap<String, Urn>>,
    /// Manually settled statuses by service identity.
    pending: Arc<DashMap<String, StatusSender>>,
    /// Registration counter.
    seq: Arc<AtomicU64>,
}

impl MemoryEngine {
    /// Create a new engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryEngineConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: MemoryEngineConfig) -> Self {
        Self {
            config,
            resources: Arc::new(DashMap::new()),
            ids: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// All registrations in registration order.
    pub fn resources(&self) -> Vec<RegisteredResource> {
        let mut all: Vec<_> = self.resources.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|r| r.seq);
        all
    }

    /// Look up one registration.
    pub fn get(&self, urn: &Urn) -> Option<RegisteredResource> {
        self.resources.get(urn).map(|r| r.value().clone())
    }

    /// Direct children of `parent` in registration order.
    pub fn children(&self, parent: &Urn) -> Vec<RegisteredResource> {
        self.resources()
            .into_iter()
            .filter(|r| r.parent.as_ref() == Some(parent))
            .collect()
    }

    /// Settle a manually settled service. Returns false if nothing was pending.
    pub fn settle(&self, id: &str, statuses: Vec<StatusEntry>) -> bool {
        self.complete(id, Ok(statuses))
    }

    /// Fail a manually settled service. Returns false if nothing was pending.
    pub fn fail(&self, id: &str, reason: &str) -> bool {
        let error = EngineError::StatusFailed {
            resource: id.to_string(),
            reason: reason.to_string(),
        };
        self.complete(id, Err(error.into()))
    }

    fn complete(&self, id: &str, result: Settled<Vec<StatusEntry>>) -> bool {
        match self.pending.remove(id) {
            Some((_, tx)) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Number of service statuses awaiting manual settlement.
    pub fn pending_statuses(&self) -> usize {
        self.pending.len()
    }

    fn duplicate(name: &str, urn: &Urn) -> EngineError {
        EngineError::Rejected {
            resource: name.to_string(),
            diagnostic: format!("{urn} is already registered"),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn insert(&self, record: RegisteredResource) -> Result<(), EngineError> {
        match self.resources.entry(record.urn.clone()) {
            Entry::Occupied(_) => Err(Self::duplicate(&record.name, &record.urn)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn check_edges(&self, name: &str, options: &SubmitOptions) -> Result<(), EngineError> {
        let unknown = options
            .parent
            .iter()
            .chain(options.depends_on.iter())
            .find(|urn| !self.resources.contains_key(*urn));
        match unknown {
            Some(urn) => Err(EngineError::Rejected {
                resource: name.to_string(),
                diagnostic: format!("unknown resource {urn}"),
            }),
            None => Ok(()),
        }
    }

    fn check_service(spec: &ServiceSpec) -> Result<(), EngineError> {
        if spec.template.containers.is_empty() {
            return Err(EngineError::Rejected {
                resource: spec.name.clone(),
                diagnostic: "service must declare at least one container".to_string(),
            });
        }
        Ok(())
    }

    fn check_policy(&self, spec: &AccessPolicySpec) -> Result<String, EngineError> {
        match &spec.service {
            ServiceRef::Resolved(id) if self.ids.contains_key(id) => Ok(id.clone()),
            ServiceRef::Resolved(id) => Err(EngineError::Rejected {
                resource: spec.name.clone(),
                diagnostic: format!("service {id} does not exist"),
            }),
            ServiceRef::Pending(name) => Err(EngineError::Rejected {
                resource: spec.name.clone(),
                diagnostic: format!("service {name} has not been created yet"),
            }),
        }
    }

    fn service_status(&self, id: &str) -> Deferred<Vec<StatusEntry>> {
        if self.config.fail_status {
            return Deferred::failed(OutputError::Engine(EngineError::StatusFailed {
                resource: id.to_string(),
                reason: "revision failed to become ready".to_string(),
            }));
        }

        let statuses = if self.config.empty_status {
            Vec::new()
        } else {
            vec![StatusEntry {
                url: format!("https://{id}.{}", self.config.url_domain),
                latest_ready_revision: Some(format!("{id}-00001")),
            }]
        };

        match self.config.settle {
            SettleMode::Immediate => {
                let latency = Duration::from_millis(self.config.latency_ms);
                Deferred::from_future(async move {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    Ok(statuses)
                })
            }
            SettleMode::Manual => {
                let (tx, rx) = oneshot::channel();
                self.pending.insert(id.to_string(), tx);
                let resource = id.to_string();
                Deferred::from_future(async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(OutputError::Engine(EngineError::Unavailable(format!(
                            "status of {resource} was abandoned"
                        ))))
                    })
                })
            }
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceEngine for MemoryEngine {
    #[instrument(skip(self))]
    async fn register_component(&self, type_token: &str, name: &str) -> Result<Urn, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Rejected {
                resource: type_token.to_string(),
                diagnostic: "component name must not be empty".to_string(),
            });
        }

        let urn = Urn::new(type_token, name);
        self.insert(RegisteredResource {
            urn: urn.clone(),
            seq: self.next_seq(),
            type_token: type_token.to_string(),
            name: name.to_string(),
            id: None,
            parent: None,
            depends_on: Vec::new(),
            spec: None,
            outputs: Vec::new(),
        })?;

        debug!(%urn, "Registered component");
        Ok(urn)
    }

    #[instrument(skip(self, spec, options), fields(kind = %spec.kind(), name = %spec.name()))]
    async fn submit(
        &self,
        spec: ResourceSpec,
        options: SubmitOptions,
    ) -> Result<ResourceHandle, EngineError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let kind = spec.kind();
        let name = spec.name().to_string();

        if self.config.reject_kind == Some(kind) {
            return Err(EngineError::Rejected {
                resource: name,
                diagnostic: format!("{kind} submissions are disabled"),
            });
        }
        self.check_edges(&name, &options)?;

        let urn = Urn::new(kind.type_token(), &name);
        if self.resources.contains_key(&urn) {
            return Err(Self::duplicate(&name, &urn));
        }
        let policy_target = match &spec {
            ResourceSpec::Service(service) => {
                Self::check_service(service)?;
                None
            }
            ResourceSpec::AccessPolicy(policy) => Some(self.check_policy(policy)?),
        };

        // Nothing below rejects except a concurrent insert of the same URN.
        let seq = self.next_seq();
        let (id, statuses) = match (&spec, policy_target) {
            (ResourceSpec::AccessPolicy(policy), Some(service_id)) => {
                let id = format!("{service_id}/{}/{}", policy.role, policy.member);
                (id, Deferred::ready(Vec::new()))
            }
            _ => {
                let id = format!("{name}-{seq:08x}");
                let statuses = self.service_status(&id);
                (id, statuses)
            }
        };

        let inserted = self.insert(RegisteredResource {
            urn: urn.clone(),
            seq,
            type_token: kind.type_token().to_string(),
            name,
            id: Some(id.clone()),
            parent: options.parent,
            depends_on: options.depends_on,
            spec: Some(spec),
            outputs: Vec::new(),
        });
        if let Err(e) = inserted {
            self.pending.remove(&id);
            return Err(e);
        }
        if kind == ResourceKind::Service {
            self.ids.insert(id.clone(), urn.clone());
        }

        debug!(%urn, %id, "Accepted submission");
        Ok(ResourceHandle {
            urn,
            id,
            kind,
            statuses,
        })
    }

    async fn register_outputs(
        &self,
        urn: &Urn,
        outputs: &OutputRecord,
    ) -> Result<(), EngineError> {
        match self.resources.get_mut(urn) {
            Some(mut record) => {
                record.outputs = outputs.names().map(str::to_string).collect();
                Ok(())
            }
            None => Err(EngineError::Rejected {
                resource: urn.to_string(),
                diagnostic: "cannot register outputs of an unknown component".to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn destroy(&self, urn: &Urn) -> Result<usize, EngineError> {
        if !self.resources.contains_key(urn) {
            return Err(EngineError::Rejected {
                resource: urn.to_string(),
                diagnostic: "nothing to destroy".to_string(),
            });
        }

        let mut doomed = vec![urn.clone()];
        let mut next = 0;
        while next < doomed.len() {
            let current = doomed[next].clone();
            let children: Vec<Urn> = self
                .resources
                .iter()
                .filter(|r| r.parent.as_ref() == Some(&current))
                .map(|r| r.key().clone())
                .collect();
            doomed.extend(children);
            next += 1;
        }

        let mut removed = 0;
        for urn in doomed.iter().rev() {
            if let Some((_, record)) = self.resources.remove(urn) {
                if let Some(id) = record.id {
                    self.ids.remove(&id);
                    self.pending.remove(&id);
                }
                removed += 1;
            }
        }

        debug!(%urn, removed, "Destroyed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ConfigInput, MemoryQuantity};
    use crate::resources::build;

    fn input() -> ConfigInput {
        ConfigInput {
            image_url: "repo/img:latest".to_string(),
            container_port: 8080,
            cpu: 1,
            memory: MemoryQuantity::DEFAULT,
            concurrency: 50,
            message: "hello".to_string(),
            location: "europe-west1".to_string(),
            project: "demo".to_string(),
            allow_unauthenticated: true,
        }
    }

    #[tokio::test]
    async fn service_settles_with_minted_url() {
        let engine = MemoryEngine::new();
        let (service, _) = build("app", &input());

        let handle = engine
            .submit(service.into(), SubmitOptions::default())
            .await
            .unwrap();

        assert_eq!(handle.kind, ResourceKind::Service);
        assert!(handle.id.starts_with("app-service-"));
        let statuses = handle.statuses.await.unwrap();
        assert_eq!(statuses[0].url, format!("https://{}.run.app", handle.id));
    }

    #[tokio::test]
    async fn unbound_policy_is_rejected() {
        let engine = MemoryEngine::new();
        let (_, policy) = build("app", &input());

        let err = engine
            .submit(policy.into(), SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected { ref resource, .. } if resource == "app-invoker"));
    }

    #[tokio::test]
    async fn unknown_parent_is_rejected() {
        let engine = MemoryEngine::new();
        let (service, _) = build("app", &input());
        let ghost = Urn::new("custom:index:CloudRunService", "ghost");

        let result = engine
            .submit(service.into(), SubmitOptions::child_of(&ghost))
            .await;
        assert!(matches!(result, Err(EngineError::Rejected { .. })));
        assert!(engine.resources().is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_empty_components_are_rejected() {
        let engine = MemoryEngine::new();
        engine.register_component("t", "app").await.unwrap();
        assert!(engine.register_component("t", "app").await.is_err());
        assert!(engine.register_component("t", "  ").await.is_err());
    }

    #[tokio::test]
    async fn manual_settlement_and_failure() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig {
            settle: SettleMode::Manual,
            ..Default::default()
        });
        let (service, _) = build("app", &input());
        let handle = engine
            .submit(service.into(), SubmitOptions::default())
            .await
            .unwrap();

        assert!(engine.fail(&handle.id, "quota exceeded"));
        assert!(!engine.settle(&handle.id, Vec::new()));
        assert!(matches!(
            handle.statuses.await,
            Err(OutputError::Engine(EngineError::StatusFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn duplicate_service_leaves_no_pending_status() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig {
            settle: SettleMode::Manual,
            ..Default::default()
        });
        let (service, _) = build("app", &input());
        let first = engine
            .submit(service.clone().into(), SubmitOptions::default())
            .await
            .unwrap();

        let err = engine
            .submit(service.into(), SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected { ref diagnostic, .. } if diagnostic.contains("already registered")));
        assert_eq!(engine.pending_statuses(), 1);

        let (other, _) = build("other", &input());
        let second = engine
            .submit(other.into(), SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(first.id, "app-service-00000000");
        assert_eq!(second.id, "other-service-00000001");
        assert_eq!(engine.pending_statuses(), 2);
    }

    #[tokio::test]
    async fn destroy_removes_descendants() {
        let engine = MemoryEngine::new();
        let parent = engine.register_component("t", "app").await.unwrap();
        let (service, _) = build("app", &input());
        engine
            .submit(service.into(), SubmitOptions::child_of(&parent))
            .await
            .unwrap();

        assert_eq!(engine.destroy(&parent).await.unwrap(), 2);
        assert!(engine.resources().is_empty());
        assert!(engine.destroy(&parent).await.is_err());
    }
}
