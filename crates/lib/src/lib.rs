//! vorpal-sdk: declare content-addressed build artifacts
//!
//! Definition programs use this crate to describe artifacts, submit them to
//! an agent and hand the resulting graph to the orchestrator:
//! - `Artifact`: sources, steps and target systems, identified by a digest
//! - `step`: sandboxed or plain shell steps for each system
//! - `source`: hashed, cached input trees
//! - `ConfigContext`: the digest-to-artifact map and its agent and registry
//!   clients

pub mod api;
pub mod artifact;
pub mod config;
pub mod consts;
pub mod context;
pub mod paths;
pub mod server;
pub mod source;
pub mod step;
pub mod system;
pub mod util;

#[cfg(test)]
mod testutil;

pub use artifact::{Artifact, ArtifactSource, ArtifactStep, ArtifactStepSecret};
pub use context::{ConfigContext, ContextError};
pub use system::ArtifactSystem;
