//! End-to-end tests of the deployment program against the in-process engine.

use std::future::IntoFuture;

use cloudrun_service::deployment::deploy;
use cloudrun_service::engine::{
    MemoryEngine, MemoryEngineConfig, ResourceEngine, SettleMode, StatusEntry,
};
use cloudrun_service::error::{DeployError, EngineError, OutputError, ValidationError};
use cloudrun_service::input::RawConfig;
use cloudrun_service::resources::{ResourceKind, ResourceSpec, MESSAGE_ENV};
use cloudrun_service::{create, resolve, validate};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_test::{assert_pending, assert_ready_eq, task};

fn raw(value: Value) -> RawConfig {
    value.as_object().cloned().expect("object")
}

fn demo() -> RawConfig {
    raw(json!({
        "location": "europe-west1",
        "project": "demo",
        "imageUrl": "repo/img:latest",
        "message": "Hello from Pulumi Cloud Run!",
    }))
}

#[tokio::test]
async fn url_resolves_from_first_status_entry() {
    let engine = MemoryEngine::with_config(MemoryEngineConfig {
        settle: SettleMode::Manual,
        ..Default::default()
    });
    let input = validate(&demo()).unwrap();
    let handle = create("my-cloudrun-app", &input, &engine).await.unwrap();
    let outputs = resolve(&handle);

    // Nothing is available until the engine settles the service.
    let mut url = task::spawn(outputs.url.clone().into_future());
    assert_pending!(url.poll());
    assert!(outputs.url.peek().is_none());

    assert!(engine.settle(
        &handle.service.id,
        vec![StatusEntry::with_url("https://svc-abc.run.app")],
    ));
    assert!(url.is_woken());
    assert_ready_eq!(url.poll(), Ok("https://svc-abc.run.app".to_string()));
    assert_eq!(
        outputs.url.peek(),
        Some(Ok("https://svc-abc.run.app".to_string()))
    );
}

#[tokio::test]
async fn empty_status_list_fails_output_only() {
    let engine = MemoryEngine::with_config(MemoryEngineConfig {
        settle: SettleMode::Manual,
        ..Default::default()
    });
    let deployment = deploy("app", &demo(), &engine).await.unwrap();

    engine.settle(&deployment.handle.service.id, Vec::new());

    assert_eq!(
        deployment.exports().await,
        Err(OutputError::EmptyStatusList {
            resource: deployment.handle.service.id.clone()
        })
    );
    // The component itself is still registered with both children.
    assert_eq!(engine.children(&deployment.handle.urn).len(), 2);
}

#[tokio::test]
async fn submitted_service_carries_user_message() {
    let engine = MemoryEngine::new();
    let deployment = deploy("app", &demo(), &engine).await.unwrap();

    let record = engine.get(&deployment.handle.service.urn).unwrap();
    match record.spec {
        Some(ResourceSpec::Service(spec)) => {
            assert_eq!(spec.env(MESSAGE_ENV), Some("Hello from Pulumi Cloud Run!"));
        }
        other => panic!("unexpected spec {other:?}"),
    }
}

#[tokio::test]
async fn policy_is_submitted_after_service() {
    let engine = MemoryEngine::new();
    let deployment = deploy("app", &demo(), &engine).await.unwrap();

    let kinds: Vec<Option<ResourceKind>> = engine
        .resources()
        .iter()
        .map(|r| r.spec.as_ref().map(ResourceSpec::kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            None,
            Some(ResourceKind::Service),
            Some(ResourceKind::AccessPolicy)
        ]
    );

    let policy = deployment.handle.access_policy.unwrap();
    let record = engine.get(&policy.urn).unwrap();
    assert_eq!(record.depends_on, vec![deployment.handle.service.urn]);
}

#[tokio::test]
async fn missing_project_fails_before_engine() {
    let engine = MemoryEngine::new();
    let mut bag = demo();
    bag.remove("project");

    match deploy("app", &bag, &engine).await {
        Err(DeployError::Validation(ValidationError::MissingRequiredField { field })) => {
            assert_eq!(field, "project")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(engine.resources().is_empty());
}

#[tokio::test]
async fn rejected_service_surfaces_engine_diagnostic() {
    let engine = MemoryEngine::with_config(MemoryEngineConfig {
        reject_kind: Some(ResourceKind::Service),
        ..Default::default()
    });

    match deploy("app", &demo(), &engine).await {
        Err(DeployError::Engine(EngineError::Rejected { resource, diagnostic })) => {
            assert_eq!(resource, "app-service");
            assert!(diagnostic.contains("service"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn two_components_are_independent() {
    let engine = MemoryEngine::new();
    let first = deploy("first", &demo(), &engine).await.unwrap();
    let second = deploy("second", &demo(), &engine).await.unwrap();

    assert_ne!(first.handle.service.id, second.handle.service.id);
    assert_eq!(engine.destroy(&first.handle.urn).await.unwrap(), 3);
    assert_eq!(engine.resources().len(), 3);
    assert!(second.exports().await.is_ok());
}

#[tokio::test]
async fn private_deployment_skips_invoker() {
    let engine = MemoryEngine::new();
    let mut bag = demo();
    bag.insert("allowUnauthenticated".to_string(), json!(false));

    let deployment = deploy("app", &bag, &engine).await.unwrap();
    assert!(deployment.handle.access_policy.is_none());
    assert_eq!(engine.resources().len(), 2);
}
