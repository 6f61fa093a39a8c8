//! Domain layer: pure types, rules and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod comparison;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod lifecycle;
pub mod outputs;
pub mod retry;

pub use comparison::{Expectation, compare};
pub use config::{ExpectedField, HarnessConfig, RetryConfig, validate_config};
pub use coordinates::{AmbientEnv, ResolvedCoordinates, ResourceCoordinates, resolve_subscription};
pub use error::{ConfigError, LifecycleError, LiveQueryError, OutputNotFound, ProvisionError, StagingError};
pub use lifecycle::{PhaseTracker, RunPhase};
pub use outputs::DeclaredOutputs;
pub use retry::RetryPolicy;
