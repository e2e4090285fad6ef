//! Public outputs derived from a component's child resources.

use std::collections::BTreeMap;

use tracing::warn;
use url::Url;

use crate::composite::CompositeHandle;
use crate::deferred::Deferred;
use crate::engine::StatusEntry;
use crate::error::OutputError;
use crate::metrics;

/// Name of the service URL output.
pub const URL_OUTPUT: &str = "url";

/// Outputs of a Cloud Run component.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    /// Public service URL.
    pub url: Deferred<String>,
}

impl OutputRecord {
    /// Output names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        [URL_OUTPUT].into_iter()
    }

    /// Look up an output by name.
    pub fn get(&self, name: &str) -> Option<&Deferred<String>> {
        match name {
            URL_OUTPUT => Some(&self.url),
            _ => None,
        }
    }

    /// Name/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Deferred<String>)> {
        [(URL_OUTPUT, &self.url)].into_iter()
    }

    /// Wait for every output and collect the concrete values.
    pub async fn resolve_all(&self) -> Result<BTreeMap<String, String>, OutputError> {
        let mut resolved = BTreeMap::new();
        for (name, value) in self.iter() {
            resolved.insert(name.to_string(), value.clone().await?);
        }
        Ok(resolved)
    }
}

/// Derive the outputs of a created component.
///
/// The returned values are pending until the engine settles the service.
pub fn resolve(handle: &CompositeHandle) -> OutputRecord {
    let resource = handle.service.id.clone();
    let url = handle.service.statuses.apply(move |statuses| {
        first_url(&resource, &statuses).inspect_err(|e| {
            metrics::inc_output_failures();
            warn!(resource = %resource, error = %e, "Service URL unavailable");
        })
    });
    OutputRecord { url }
}

/// URL of the first status entry.
pub fn first_url(resource: &str, statuses: &[StatusEntry]) -> Result<String, OutputError> {
    let entry = statuses
        .first()
        .ok_or_else(|| OutputError::EmptyStatusList {
            resource: resource.to_string(),
        })?;

    match Url::parse(&entry.url) {
        Ok(parsed) if parsed.has_host() => Ok(entry.url.clone()),
        _ => Err(OutputError::InvalidUrl {
            resource: resource.to_string(),
            value: entry.url.clone(),
        }),
    }
}
