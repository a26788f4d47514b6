//! Transitive dependency resolution
//!
//! A depth-first walk from one or more roots. The current path is kept as
//! an ordered stack so a cycle is reported with the exact chain that closed
//! it, e.g. `a -> b -> c -> a`. Completed nodes are memoized so shared
//! dependencies are resolved once.
//!
//! # Example
//!
//! ```ignore
//! let graph = DependencyResolver::new(&resolver).resolve_dependencies(ArtifactKind::Agent, &root)?;
//! for node in graph.iter() {
//!     println!("{} from {}", node.id, node.artifact.source_tier);
//! }
//! ```

use crate::resolver::ArtifactSource;
use crate::tiers::ResolvedArtifact;
use crate::{Error, Result};
use forge_meta::{ArtifactDefinition, ArtifactKind, ArtifactReference};
use semver::Version;
use std::collections::HashMap;

/// Identity of a node: kind, name and exact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub kind: ArtifactKind,
    pub name: String,
    pub version: Version,
}

impl NodeId {
    fn of(resolved: &ResolvedArtifact) -> Self {
        Self {
            kind: resolved.kind,
            name: resolved.definition.name.clone(),
            version: resolved.version.clone(),
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub artifact: ResolvedArtifact,
    /// Direct dependencies, in declaration order.
    pub dependencies: Vec<NodeId>,
}

/// Resolved nodes of one resolution pass, dependencies before dependents.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    roots: Vec<NodeId>,
    nodes: HashMap<NodeId, GraphNode>,
    order: Vec<NodeId>,
}

impl DependencyGraph {
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in dependency-first order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, node: GraphNode) {
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }
}

pub struct DependencyResolver<'a, S: ArtifactSource + ?Sized> {
    source: &'a S,
}

struct Walk {
    graph: DependencyGraph,
    /// Current path from the root, in order.
    path: Vec<NodeId>,
    /// Completed references, so repeats skip the source entirely.
    done: HashMap<(ArtifactKind, String), NodeId>,
}

impl<'a, S: ArtifactSource + ?Sized> DependencyResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Expand the declared dependencies of `root` transitively.
    ///
    /// `root` itself is part of the path, so a dependency that leads back to
    /// it is reported as a cycle.
    pub fn resolve_dependencies(&self, kind: ArtifactKind, root: &ArtifactDefinition) -> Result<DependencyGraph> {
        let version = root
            .validate_versioned()
            .map_err(|e| Error::validation(format!("{kind} '{}'", root.name), e))?;
        let root_id = NodeId {
            kind,
            name: root.name.clone(),
            version,
        };

        let mut walk = Walk {
            graph: DependencyGraph::default(),
            path: vec![root_id.clone()],
            done: HashMap::new(),
        };
        for (dep_kind, reference) in root.dependencies.references()? {
            self.visit(dep_kind, &reference, &mut walk)?;
        }
        walk.graph.roots = vec![root_id];
        Ok(walk.graph)
    }

    /// Resolve each root reference and its transitive dependencies into a
    /// single graph.
    pub fn resolve_roots(&self, roots: &[(ArtifactKind, ArtifactReference)]) -> Result<DependencyGraph> {
        let mut walk = Walk {
            graph: DependencyGraph::default(),
            path: Vec::new(),
            done: HashMap::new(),
        };
        let mut root_ids = Vec::with_capacity(roots.len());
        for (kind, reference) in roots {
            let id = self.visit(*kind, reference, &mut walk)?;
            if !root_ids.contains(&id) {
                root_ids.push(id);
            }
        }
        walk.graph.roots = root_ids;
        Ok(walk.graph)
    }

    fn visit(&self, kind: ArtifactKind, reference: &ArtifactReference, walk: &mut Walk) -> Result<NodeId> {
        let memo_key = (kind, reference.to_string());
        if let Some(id) = walk.done.get(&memo_key) {
            return Ok(id.clone());
        }

        let resolved = self.source.resolve(kind, reference)?;
        let id = NodeId::of(&resolved);

        if walk.path.contains(&id) {
            let path: Vec<&str> = walk
                .path
                .iter()
                .map(|n| n.name.as_str())
                .chain(std::iter::once(id.name.as_str()))
                .collect();
            return Err(Error::CircularDependency { path: path.join(" -> ") });
        }
        if walk.graph.get(&id).is_some() {
            walk.done.insert(memo_key, id.clone());
            return Ok(id);
        }

        walk.path.push(id.clone());
        let mut dependencies = Vec::new();
        for (dep_kind, dep_ref) in resolved.definition.dependencies.references()? {
            let dep = self.visit(dep_kind, &dep_ref, walk)?;
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }
        walk.path.pop();

        tracing::debug!(node = %id, deps = dependencies.len(), "resolved dependency subtree");
        walk.graph.insert(GraphNode {
            id: id.clone(),
            artifact: resolved,
            dependencies,
        });
        walk.done.insert(memo_key, id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_meta::{Dependencies, Tier};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// In-memory source: name -> (version, agent dependencies).
    struct MapSource {
        defs: HashMap<&'static str, (&'static str, Vec<&'static str>)>,
        calls: Mutex<Vec<String>>,
    }

    impl MapSource {
        fn new(entries: &[(&'static str, &'static str, Vec<&'static str>)]) -> Self {
            Self {
                defs: entries
                    .iter()
                    .map(|(n, v, d)| (*n, (*v, d.clone())))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn definition(&self, name: &str) -> Option<ArtifactDefinition> {
            let (version, deps) = self.defs.get(name)?;
            let mut def = ArtifactDefinition::new(name, &Version::parse(version).unwrap(), "test");
            def.dependencies = Dependencies {
                agents: deps.iter().map(|d| d.to_string()).collect(),
                tools: Vec::new(),
            };
            Some(def)
        }
    }

    impl ArtifactSource for MapSource {
        fn resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
            self.calls.lock().unwrap().push(reference.name.clone());
            let definition = self.definition(&reference.name).ok_or_else(|| Error::NotFound {
                kind,
                reference: reference.to_string(),
                searched: "map".into(),
            })?;
            Ok(ResolvedArtifact {
                kind,
                version: definition.semver().unwrap(),
                definition,
                source_tier: Tier::Global,
                integrity_hash: "sha256:0".into(),
            })
        }
    }

    #[test]
    fn dependencies_come_before_dependents() {
        let source = MapSource::new(&[
            ("app", "1.0.0", vec!["b", "c"]),
            ("b", "1.0.0", vec!["c"]),
            ("c", "1.0.0", vec![]),
        ]);
        let root = source.definition("app").unwrap();
        let graph = DependencyResolver::new(&source)
            .resolve_dependencies(ArtifactKind::Agent, &root)
            .unwrap();

        let order: Vec<&str> = graph.iter().map(|n| n.id.name.as_str()).collect();
        assert_eq!(order, vec!["c", "b"]);
        // c is shared but resolved once
        assert_eq!(source.calls.lock().unwrap().iter().filter(|n| *n == "c").count(), 1);
    }

    #[test]
    fn cycle_reports_full_path() {
        let source = MapSource::new(&[
            ("a", "1.0.0", vec!["b"]),
            ("b", "1.0.0", vec!["c"]),
            ("c", "1.0.0", vec!["a"]),
        ]);
        let root = source.definition("a").unwrap();
        let err = DependencyResolver::new(&source)
            .resolve_dependencies(ArtifactKind::Agent, &root)
            .unwrap_err();
        match err {
            Error::CircularDependency { path } => assert_eq!(path, "a -> b -> c -> a"),
            other => panic!("expected a cycle, got {other}"),
        }
    }

    #[test]
    fn cycle_below_root_keeps_prefix() {
        let source = MapSource::new(&[
            ("app", "1.0.0", vec!["b"]),
            ("b", "1.0.0", vec!["c"]),
            ("c", "1.0.0", vec!["b"]),
        ]);
        let err = DependencyResolver::new(&source)
            .resolve_roots(&[(ArtifactKind::Agent, ArtifactReference::latest("app"))])
            .unwrap_err();
        assert_eq!(err.to_string(), Error::CircularDependency { path: "app -> b -> c -> b".into() }.to_string());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let source = MapSource::new(&[("a", "1.0.0", vec!["a"])]);
        let err = DependencyResolver::new(&source)
            .resolve_roots(&[(ArtifactKind::Agent, ArtifactReference::latest("a"))])
            .unwrap_err();
        assert!(err.to_string().contains("a -> a"));
    }

    #[test]
    fn missing_dependency_propagates_not_found() {
        let source = MapSource::new(&[("a", "1.0.0", vec!["ghost"])]);
        let err = DependencyResolver::new(&source)
            .resolve_roots(&[(ArtifactKind::Agent, ArtifactReference::latest("a"))])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn repeated_roots_collapse() {
        let source = MapSource::new(&[("a", "1.0.0", vec![])]);
        let graph = DependencyResolver::new(&source)
            .resolve_roots(&[
                (ArtifactKind::Agent, ArtifactReference::latest("a")),
                (ArtifactKind::Agent, ArtifactReference::latest("a")),
            ])
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.roots().len(), 1);
    }
}
