//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use forge_core::MergePolicy;
use forge_meta::{ArtifactKind, Tier};
use std::path::PathBuf;

/// Forge - resolve, lock and fork agent and tool definitions
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long, global = true, env = "FORGE_PROJECT_ROOT")]
    pub project: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Resolve a reference through the configured tiers
    ///
    /// Examples:
    ///   forge resolve agent reviewer
    ///   forge resolve tool linter@^2.1 --json
    Resolve {
        kind: KindArg,

        /// Name with an optional constraint (name, name@1.2.3, name@^1.2)
        reference: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show version, tier, hash and manifest details
    Info {
        kind: KindArg,
        reference: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List available artifacts of one kind
    List {
        kind: KindArg,

        /// Only list one tier
        #[arg(long, value_enum)]
        tier: Option<TierArg>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Store a version in the global tier
    Install { kind: KindArg, reference: String },

    /// Remove one installed version from the global tier
    Uninstall {
        kind: KindArg,
        name: String,
        version: String,
    },

    /// Pin every project artifact and its dependencies in forge.lock
    ///
    /// Examples:
    ///   forge lock
    ///   forge lock tool formatter@1.0.0 linter@^2
    Lock {
        /// Kind of the extra roots
        kind: Option<KindArg>,

        /// Extra roots to pin besides the project definitions
        #[arg(requires = "kind")]
        references: Vec<String>,
    },

    /// Resolve every lockfile entry offline and check its integrity
    Verify,

    /// Copy an upstream definition into the project under a new name
    Fork {
        kind: KindArg,

        /// Upstream reference (name, name@1.2.3, ...)
        source: String,

        /// Name of the local copy
        target: String,
    },

    /// Report whether a newer upstream version exists
    Outdated {
        kind: KindArg,
        name: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Merge the latest upstream version into a fork
    ///
    /// Prompts for every conflicting field unless --policy is given.
    Merge {
        kind: KindArg,
        name: String,

        /// Settle every conflict the same way without prompting
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Manage the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Store a registry token in the per-user config
    Login {
        /// Token to store (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove the stored registry token
    Logout,
}

/// Cache subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Drop one cache key, or everything when no key is given
    Clear { key: Option<String> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Agent,
    Tool,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Agent => ArtifactKind::Agent,
            KindArg::Tool => ArtifactKind::Tool,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierArg {
    Local,
    Global,
    Remote,
}

impl From<TierArg> for Tier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Local => Tier::Local,
            TierArg::Global => Tier::Global,
            TierArg::Remote => Tier::Remote,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    KeepLocal,
    KeepUpstream,
    Combine,
}

impl From<PolicyArg> for MergePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::KeepLocal => MergePolicy::KeepLocal,
            PolicyArg::KeepUpstream => MergePolicy::KeepUpstream,
            PolicyArg::Combine => MergePolicy::Combine,
        }
    }
}
