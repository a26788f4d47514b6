//! Shared test utilities for the forge workspace.
//!
//! Dev-dependency only, never published. Depends on nothing but
//! `tempfile`.
//!
//! # Modules
//!
//! - [`forge`]: [`TestForge`](forge::TestForge) with isolated project and
//!   global tiers
//! - [`http`]: [`MockRegistry`](http::MockRegistry), a canned-response
//!   HTTP server on a loopback port

pub mod forge;
pub mod http;

pub use forge::{TestForge, definition_yaml};
pub use http::{MockRegistry, RecordedRequest};
