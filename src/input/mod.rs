//! Input validation for the Cloud Run component.
//!
//! This module handles:
//! - The strict `ConfigInput` record every downstream component consumes
//! - Validation of raw configuration bags into that record
//! - Memory quantity and image reference parsing

pub mod image;
pub mod quantity;
pub mod validate;

pub use image::is_valid_image_reference;
pub use quantity::{MemoryQuantity, MemoryUnit};
pub use validate::{validate, RawConfig};

/// Validated component input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInput {
    /// Container image reference.
    pub image_url: String,
    /// Port the container listens on.
    pub container_port: u16,
    /// CPU limit in whole cores.
    pub cpu: u32,
    /// Memory limit.
    pub memory: MemoryQuantity,
    /// Maximum concurrent requests per instance.
    pub concurrency: u32,
    /// Message served by the container app.
    pub message: String,
    /// Region to deploy into.
    pub location: String,
    /// Cloud project id.
    pub project: String,
    /// Whether to grant unauthenticated invocation.
    pub allow_unauthenticated: bool,
}

impl ConfigInput {
    /// Default container port.
    pub const DEFAULT_PORT: u16 = 8080;
    /// Default CPU limit.
    pub const DEFAULT_CPU: u32 = 1;
    /// Default request concurrency.
    pub const DEFAULT_CONCURRENCY: u32 = 50;
    /// Default served message.
    pub const DEFAULT_MESSAGE: &'static str = "Hello from Cloud Run!";
}
