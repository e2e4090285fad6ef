//! The deployment program: validate, create the component, publish outputs.

use std::collections::BTreeMap;

use tracing::{info, instrument};

use crate::composite::{CloudRunService, CompositeHandle};
use crate::engine::ResourceEngine;
use crate::error::{OutputError, Result};
use crate::input::{validate, RawConfig};
use crate::outputs::{self, OutputRecord};
use crate::resources::ResourceSpec;

/// Component name used when none is given.
pub const DEFAULT_COMPONENT_NAME: &str = "my-cloudrun-app";

/// A created component and its outputs.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Child handles.
    pub handle: CompositeHandle,
    /// Deferred outputs.
    pub outputs: OutputRecord,
}

impl Deployment {
    /// Wait for the outputs and return them as exports.
    pub async fn exports(&self) -> std::result::Result<BTreeMap<String, String>, OutputError> {
        self.outputs.resolve_all().await
    }
}

/// Child specs the deployment would submit, without touching an engine.
pub fn plan(name: &str, raw: &RawConfig) -> Result<Vec<ResourceSpec>> {
    let input = validate(raw)?;
    Ok(CloudRunService::new(name, &input).plan())
}

/// Validate `raw` and create component `name` on `engine`.
///
/// Returns once the children are submitted; outputs may still be pending.
#[instrument(skip(raw, engine))]
pub async fn deploy(name: &str, raw: &RawConfig, engine: &dyn ResourceEngine) -> Result<Deployment> {
    let input = validate(raw)?;
    info!(
        image = %input.image_url,
        location = %input.location,
        project = %input.project,
        "Input validated"
    );

    let handle = CloudRunService::new(name, &input).create(engine).await?;
    let outputs = outputs::resolve(&handle);
    Ok(Deployment { handle, outputs })
}
