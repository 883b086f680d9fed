//! gembridge - gem repositories for Ivy and Maven clients
//!
//! Resolves gem repository paths through a per-upstream on-disk cache and
//! exposes the results three ways: `mavengem:` locators opened in process,
//! an Ivy descriptor proxy, and a multiplexer serving Maven-shaped release
//! paths for several upstreams.

pub mod cache;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod gems;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod translator;
pub mod ui;
pub mod upstream;

pub use error::{GemBridgeError, GemBridgeResult};
