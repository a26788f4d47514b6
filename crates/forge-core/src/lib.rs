//! Resolution engine for the Forge artifact registry
//!
//! This crate sits above `forge-fs` and `forge-meta` and implements:
//!
//! - **Source resolution**: an ordered list of tier strategies
//!   (project-local, global, remote) consulted until one hits
//! - **Cache management**: in-memory and on-disk layers with TTL freshness
//! - **Remote access**: an authenticated HTTP client with bounded retries
//! - **Dependency graphs**: depth-first expansion with cycle paths
//! - **Lockfiles**: integrity-checked pins and offline resolution
//! - **Forks**: provenance tracking and three-way upstream merges
//!
//! # Architecture
//!
//! ```text
//!                    forge-cli
//!                        |
//!                   forge-core
//!                        |
//!              +---------+---------+
//!              |                   |
//!          forge-meta          forge-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use forge_core::Forge;
//! use forge_meta::ArtifactKind;
//!
//! let forge = Forge::open(".")?;
//! let resolved = forge.resolve(ArtifactKind::Agent, "reviewer@^1.2")?;
//! println!("{} {} from {}", resolved.name(), resolved.version, resolved.source_tier);
//! ```

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod forge;
pub mod fork;
pub mod graph;
pub mod handle;
pub mod lockfile;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod tiers;

pub use auth::{TokenResolver, TokenSource, clear_token, store_token};
pub use cache::{CacheEntry, CacheManager};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigResolver, ForgeConfig};
pub use error::{Error, Result};
pub use forge::{ArtifactInfo, ArtifactListing, Forge, ForgeBuilder};
pub use fork::{
    Conflict, ConflictResolutionStrategy, ForkEngine, MergeOutcome, MergePolicy, PolicyStrategy, Resolution,
    UpstreamStatus,
};
pub use graph::{DependencyGraph, DependencyResolver, GraphNode, NodeId};
pub use handle::{CacheSettings, RegistryHandle, RemoteSettings};
pub use lockfile::{LockfileManager, PinnedSource};
pub use remote::{CatalogItem, HttpRegistryClient, RegistryClient};
pub use resolver::{ArtifactSource, SourceResolver};
pub use tiers::{GlobalTier, LocalTier, RemoteTier, ResolvedArtifact, TierStrategy};
