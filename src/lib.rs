//! Composite Cloud Run service definition.
//!
//! This library declares one containerized HTTP service on Cloud Run as a
//! reusable component, and ships the demo app that runs inside it.
//!
//! # Flow
//!
//! ```text
//! raw config bag ──validate──▶ ConfigInput ──build──▶ ServiceSpec + AccessPolicySpec
//!                                                          │
//!                                                   submit to engine
//!                                                          │
//!                            CompositeHandle ──resolve──▶ OutputRecord { url }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration sources and container app settings
//! - [`error`]: Unified error types
//! - [`input`]: Validation of raw configuration into `ConfigInput`
//! - [`resources`]: Resource specs and the pure spec builder
//! - [`engine`]: The engine trait and the in-process engine
//! - [`deferred`]: Values available once dependencies settle
//! - [`composite`]: The Cloud Run composite resource
//! - [`outputs`]: Output resolution
//! - [`deployment`]: The top-level deployment program
//! - [`app`]: The container's HTTP app
//! - [`metrics`]: Metric names and helpers
//! - [`utils`]: Utility functions

pub mod app;
pub mod composite;
pub mod config;
pub mod deferred;
pub mod deployment;
pub mod engine;
pub mod error;
pub mod input;
pub mod metrics;
pub mod outputs;
pub mod resources;
pub mod utils;

pub use composite::{create, CloudRunService, CompositeHandle};
pub use config::{AppConfig, ConfigSources};
pub use error::{DeployError, Result};
pub use input::{validate, ConfigInput};
pub use outputs::{resolve, OutputRecord};
pub use resources::build;
