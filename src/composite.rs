//! The Cloud Run composite resource.
//!
//! A `CloudRunService` owns the specs built from one `ConfigInput` until it
//! hands them to an engine. Creation registers the component, submits the
//! service, then submits the invoker policy bound to the service identity
//! the engine allocated. Status settlement is never awaited here.

use tracing::{info, instrument, warn};

use crate::engine::{ResourceEngine, ResourceHandle, SubmitOptions, Urn};
use crate::error::EngineError;
use crate::input::ConfigInput;
use crate::metrics;
use crate::outputs::{self, OutputRecord};
use crate::resources::{self, AccessPolicySpec, ResourceSpec, ServiceSpec};

/// Type token the component registers under.
pub const COMPONENT_TYPE: &str = "custom:index:CloudRunService";

/// Handles of a created component.
#[derive(Debug, Clone)]
pub struct CompositeHandle {
    /// Component name.
    pub name: String,
    /// Component URN.
    pub urn: Urn,
    /// The service.
    pub service: ResourceHandle,
    /// The invoker binding, absent for private services.
    pub access_policy: Option<ResourceHandle>,
}

impl CompositeHandle {
    /// Derive this component's outputs.
    pub fn outputs(&self) -> OutputRecord {
        outputs::resolve(self)
    }
}

/// A Cloud Run service plus its optional public invoker binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudRunService {
    name: String,
    service: ServiceSpec,
    access_policy: Option<AccessPolicySpec>,
}

impl CloudRunService {
    /// Build the child specs for component `name`.
    pub fn new(name: impl Into<String>, input: &ConfigInput) -> Self {
        let name = name.into();
        let (service, policy) = resources::build(&name, input);
        Self {
            name,
            service,
            access_policy: input.allow_unauthenticated.then_some(policy),
        }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service spec.
    pub fn service(&self) -> &ServiceSpec {
        &self.service
    }

    /// Invoker binding spec, if the service is public.
    pub fn access_policy(&self) -> Option<&AccessPolicySpec> {
        self.access_policy.as_ref()
    }

    /// Child specs in submission order.
    pub fn plan(&self) -> Vec<ResourceSpec> {
        let mut specs = vec![ResourceSpec::Service(self.service.clone())];
        if let Some(policy) = &self.access_policy {
            specs.push(ResourceSpec::AccessPolicy(policy.clone()));
        }
        specs
    }

    /// Register the component and submit its children.
    #[instrument(skip(self, engine), fields(component = %self.name))]
    pub async fn create(self, engine: &dyn ResourceEngine) -> Result<CompositeHandle, EngineError> {
        let urn = engine.register_component(COMPONENT_TYPE, &self.name).await?;

        let service = submit(
            engine,
            self.service.into(),
            SubmitOptions::child_of(&urn),
        )
        .await?;

        let access_policy = match self.access_policy {
            Some(policy) => {
                let bound = policy.for_service(service.id.clone());
                let options = SubmitOptions::child_of(&urn).depends_on(&service.urn);
                Some(submit(engine, bound.into(), options).await?)
            }
            None => {
                info!("Private service, skipping invoker binding");
                None
            }
        };

        let handle = CompositeHandle {
            name: self.name,
            urn,
            service,
            access_policy,
        };
        engine
            .register_outputs(&handle.urn, &handle.outputs())
            .await?;

        metrics::inc_components_created();
        info!(urn = %handle.urn, service_id = %handle.service.id, "Component created");
        Ok(handle)
    }
}

/// Create component `name` from `input` on `engine`.
pub async fn create(
    name: &str,
    input: &ConfigInput,
    engine: &dyn ResourceEngine,
) -> Result<CompositeHandle, EngineError> {
    CloudRunService::new(name, input).create(engine).await
}

async fn submit(
    engine: &dyn ResourceEngine,
    spec: ResourceSpec,
    options: SubmitOptions,
) -> Result<ResourceHandle, EngineError> {
    let kind = spec.kind();
    let _timer = metrics::timer_submit();

    match engine.submit(spec, options).await {
        Ok(handle) => {
            metrics::inc_resources_submitted(kind);
            info!(%kind, urn = %handle.urn, id = %handle.id, "Submitted");
            Ok(handle)
        }
        Err(e) => {
            metrics::inc_engine_rejections(kind);
            warn!(%kind, error = %e, "Engine refused submission");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, MemoryEngineConfig};
    use crate::error::OutputError;
    use crate::input::MemoryQuantity;
    use crate::resources::{ResourceKind, ServiceRef};

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
    async fn children_are_owned_and_ordered() {
        let engine = MemoryEngine::new();
        let handle = create("app", &input(), &engine).await.unwrap();

        let records = engine.resources();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].urn, handle.urn);
        assert_eq!(records[0].type_token, COMPONENT_TYPE);
        assert_eq!(records[1].urn, handle.service.urn);
        assert_eq!(records[2].parent.as_ref(), Some(&handle.urn));
        assert_eq!(records[2].depends_on, vec![handle.service.urn.clone()]);
        assert_eq!(records[0].outputs, vec!["url".to_string()]);

        let policy = handle.access_policy.unwrap();
        assert_eq!(policy.kind, ResourceKind::AccessPolicy);
        match &records[2].spec {
            Some(ResourceSpec::AccessPolicy(spec)) => {
                assert_eq!(spec.service, ServiceRef::Resolved(handle.service.id.clone()))
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[tokio::test]
    async fn private_service_has_no_policy() {
        let engine = MemoryEngine::new();
        let mut private = input();
        private.allow_unauthenticated = false;

        let component = CloudRunService::new("app", &private);
        assert!(component.access_policy().is_none());
        assert_eq!(component.plan().len(), 1);

        let handle = component.create(&engine).await.unwrap();
        assert!(handle.access_policy.is_none());
        assert_eq!(engine.children(&handle.urn).len(), 1);
    }

    #[tokio::test]
    async fn rejection_is_propagated() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig {
            reject_kind: Some(ResourceKind::AccessPolicy),
            ..Default::default()
        });

        let err = create("app", &input(), &engine).await.unwrap_err();
        assert!(matches!(err, EngineError::Rejected { ref resource, .. } if resource == "app-invoker"));
    }

    #[tokio::test]
    async fn creation_succeeds_even_when_url_cannot_resolve() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig {
            empty_status: true,
            ..Default::default()
        });

        let handle = create("app", &input(), &engine).await.unwrap();
        assert!(matches!(
            handle.outputs().url.await,
            Err(OutputError::EmptyStatusList { .. })
        ));
    }

    #[tokio::test]
    async fn destroy_tears_down_children() {
        let engine = MemoryEngine::new();
        let handle = create("app", &input(), &engine).await.unwrap();

        assert_eq!(engine.destroy(&handle.urn).await.unwrap(), 3);
        assert!(engine.get(&handle.service.urn).is_none());
    }
}
