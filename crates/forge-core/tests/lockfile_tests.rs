//! Tests for lockfile generation, pinned resolution and dependency graphs

mod common;

use common::{FakeRegistry, definition, offline_session, session};
use forge_core::Error;
use forge_meta::{ArtifactKind, ArtifactReference, Lockfile, Tier};
use forge_test_utils::{TestForge, definition_yaml};

const APP: &str = r#"name: app
version: 1.0.0
description: Orchestrates the others
dependencies:
  agents:
    - helper
  tools:
    - linter@^2
"#;

/// A project agent depending on a remote agent and a global tool.
fn project_with_dependencies() -> (TestForge, std::sync::Arc<FakeRegistry>) {
    let env = TestForge::new();
    env.write_local("agent", "app", APP);
    env.write_global("tool", "linter", "2.3.1", &definition_yaml("linter", "2.3.1", "Lints"));
    let registry = FakeRegistry::new();
    registry.publish(ArtifactKind::Agent, definition("helper", "0.4.0", "Helps"));
    (env, registry)
}

mod generation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_pins_every_active_name() {
        let (env, registry) = project_with_dependencies();
        let lockfile = session(&env, &registry).generate_lockfile(&[]).unwrap();

        assert_eq!(lockfile.version, Lockfile::VERSION);
        assert_eq!(lockfile.len(), 3);

        let app = lockfile.get(ArtifactKind::Agent, "app").unwrap();
        assert_eq!(app.version, "1.0.0");
        assert_eq!(app.resolved_tier, Tier::Local);
        assert_eq!(app.dependencies.agents.get("helper").map(String::as_str), Some("0.4.0"));
        assert_eq!(app.dependencies.tools.get("linter").map(String::as_str), Some("2.3.1"));

        // Remote hits are pinned to the global tier they were persisted into.
        let helper = lockfile.get(ArtifactKind::Agent, "helper").unwrap();
        assert_eq!(helper.resolved_tier, Tier::Global);

        let linter = lockfile.get(ArtifactKind::Tool, "linter").unwrap();
        assert!(linter.integrity_hash.starts_with("sha256:"));

        env.assert_file_exists(env.local_dir().join("forge.lock"));
    }

    #[test]
    fn test_generate_includes_supplied_roots() {
        let (env, registry) = project_with_dependencies();
        env.write_global("tool", "fmt", "1.0.0", &definition_yaml("fmt", "1.0.0", "Formats"));

        let roots = vec![(ArtifactKind::Tool, ArtifactReference::parse("fmt@1.0.0").unwrap())];
        let lockfile = session(&env, &registry).generate_lockfile(&roots).unwrap();

        assert!(lockfile.get(ArtifactKind::Tool, "fmt").is_some());
    }

    #[test]
    fn test_conflicting_pins_name_both_versions() {
        let env = TestForge::new();
        env.write_global("tool", "linter", "2.0.0", &definition_yaml("linter", "2.0.0", "Lints"));
        env.write_global("tool", "linter", "2.3.1", &definition_yaml("linter", "2.3.1", "Lints"));
        env.write_local(
            "agent",
            "old",
            "name: old\nversion: 1.0.0\ndescription: Old\ndependencies:\n  tools:\n    - linter@~2.0\n",
        );
        env.write_local(
            "agent",
            "new",
            "name: new\nversion: 1.0.0\ndescription: New\ndependencies:\n  tools:\n    - linter@^2\n",
        );

        let err = offline_session(&env).generate_lockfile(&[]).unwrap_err();

        assert!(matches!(err, Error::Lockfile { .. }), "got: {err}");
        let message = err.to_string();
        assert!(message.contains("2.0.0") && message.contains("2.3.1"), "got: {message}");
        env.assert_file_not_exists(env.local_dir().join("forge.lock"));
    }

    #[test]
    fn test_load_without_lockfile_names_lock_command() {
        let env = TestForge::new();
        let err = offline_session(&env).load_lockfile().unwrap_err();
        assert!(err.to_string().contains("`forge lock`"));
    }
}

mod pinned {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_lockfile_resolves_offline() {
        let (env, registry) = project_with_dependencies();
        session(&env, &registry).generate_lockfile(&[]).unwrap();
        let calls_after_generation = registry.calls();

        let forge = offline_session(&env);
        let lockfile = forge.load_lockfile().unwrap();
        for (kind, name, entry) in lockfile.iter() {
            let resolved = forge
                .resolve_from_lockfile(kind, name, &lockfile)
                .unwrap_or_else(|e| panic!("{kind} {name} should resolve offline: {e}"));
            assert_eq!(resolved.version.to_string(), entry.version);
            assert_eq!(resolved.integrity_hash, entry.integrity_hash);
        }

        assert_eq!(forge.verify_lockfile().unwrap().len(), 3);
        assert_eq!(registry.calls(), calls_after_generation);
    }

    #[test]
    fn test_tampered_content_fails_integrity() {
        let (env, registry) = project_with_dependencies();
        let lockfile = session(&env, &registry).generate_lockfile(&[]).unwrap();

        let path = env.global_path("tool", "linter", "2.3.1");
        let tampered = env.read(&path).replace("Lints", "Lintz");
        std::fs::write(&path, tampered).unwrap();

        let err = offline_session(&env)
            .resolve_from_lockfile(ArtifactKind::Tool, "linter", &lockfile)
            .unwrap_err();

        match &err {
            Error::Integrity { expected, actual, .. } => {
                assert_ne!(expected, actual);
                let message = err.to_string();
                assert!(message.contains(expected.as_str()) && message.contains(actual.as_str()));
            }
            other => panic!("expected an integrity error, got {other}"),
        }
    }

    #[test]
    fn test_missing_global_version_is_cache_miss() {
        let (env, registry) = project_with_dependencies();
        let lockfile = session(&env, &registry).generate_lockfile(&[]).unwrap();
        std::fs::remove_dir_all(env.global_dir().join("tools/linter/2.3.1")).unwrap();

        let err = offline_session(&env)
            .resolve_from_lockfile(ArtifactKind::Tool, "linter", &lockfile)
            .unwrap_err();

        assert!(matches!(err, Error::CacheMiss { .. }), "got: {err}");
        assert!(err.to_string().contains("forge install tool linter@2.3.1"));
    }

    #[test]
    fn test_edited_local_version_requires_relock() {
        let (env, registry) = project_with_dependencies();
        let lockfile = session(&env, &registry).generate_lockfile(&[]).unwrap();
        env.write_local("agent", "app", &APP.replace("version: 1.0.0", "version: 1.1.0"));

        let err = offline_session(&env)
            .resolve_from_lockfile(ArtifactKind::Agent, "app", &lockfile)
            .unwrap_err();
        assert!(matches!(err, Error::Lockfile { .. }), "got: {err}");
    }

    #[test]
    fn test_name_absent_from_lockfile() {
        let (env, registry) = project_with_dependencies();
        let lockfile = session(&env, &registry).generate_lockfile(&[]).unwrap();

        let err = offline_session(&env)
            .resolve_from_lockfile(ArtifactKind::Tool, "fmt", &lockfile)
            .unwrap_err();
        assert!(matches!(err, Error::Lockfile { .. }));
    }

    #[test]
    fn test_pinned_dependency_graph_matches_lockfile() {
        let (env, registry) = project_with_dependencies();
        session(&env, &registry).generate_lockfile(&[]).unwrap();

        let forge = offline_session(&env);
        let lockfile = forge.load_lockfile().unwrap();
        let app = forge.resolve(ArtifactKind::Agent, "app").unwrap();
        let graph = forge
            .resolve_dependencies_pinned(ArtifactKind::Agent, &app.definition, &lockfile)
            .unwrap();

        let mut names: Vec<&str> = graph.iter().map(|n| n.id.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["helper", "linter"]);
    }
}

mod graph {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_cycle(env: &TestForge) {
        for (name, dep) in [("a", "b"), ("b", "c"), ("c", "a")] {
            env.write_global(
                "agent",
                name,
                "1.0.0",
                &format!("name: {name}\nversion: 1.0.0\ndescription: Part of a loop\ndependencies:\n  agents:\n    - {dep}\n"),
            );
        }
    }

    #[test]
    fn test_cycle_reports_exact_path() {
        let env = TestForge::new();
        write_cycle(&env);
        let forge = offline_session(&env);

        let root = forge.resolve(ArtifactKind::Agent, "a").unwrap();
        let err = forge
            .resolve_dependencies(ArtifactKind::Agent, &root.definition)
            .unwrap_err();

        assert!(matches!(err, Error::CircularDependency { .. }));
        assert!(err.to_string().contains("a -> b -> c -> a"), "got: {err}");
    }

    #[test]
    fn test_cycle_blocks_lockfile_generation() {
        let env = TestForge::new();
        write_cycle(&env);
        let forge = offline_session(&env);

        let roots = vec![(ArtifactKind::Agent, ArtifactReference::latest("a"))];
        let err = forge.generate_lockfile(&roots).unwrap_err();

        assert!(matches!(err, Error::CircularDependency { .. }));
        env.assert_file_not_exists(env.local_dir().join("forge.lock"));
    }

    #[test]
    fn test_cross_kind_dependencies_are_walked() {
        let (env, registry) = project_with_dependencies();
        let forge = session(&env, &registry);

        let app = forge.resolve(ArtifactKind::Agent, "app").unwrap();
        let graph = forge
            .resolve_dependencies(ArtifactKind::Agent, &app.definition)
            .unwrap();

        assert_eq!(graph.len(), 2);
        let kinds: Vec<ArtifactKind> = graph.iter().map(|n| n.id.kind).collect();
        assert!(kinds.contains(&ArtifactKind::Agent) && kinds.contains(&ArtifactKind::Tool));
    }
}
