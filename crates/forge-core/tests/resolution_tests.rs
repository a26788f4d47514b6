//! Tests for tiered resolution through the `Forge` facade

mod common;

use common::{FakeRegistry, definition, handle, offline_session, session, session_with_clock};
use forge_core::{Error, Forge};
use forge_meta::{ArtifactKind, Manifest, Tier};
use forge_test_utils::{TestForge, definition_yaml};
use semver::Version;

mod tier_order {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_repeat_resolution_returns_identical_artifact() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.2.0", "Reviews code"));
        let forge = session(&env, &registry);

        let first = forge.resolve(ArtifactKind::Agent, "reviewer@^1").unwrap();
        let second = forge.resolve(ArtifactKind::Agent, "reviewer@^1").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.source_tier, Tier::Remote);
        assert_eq!(registry.artifact_calls(), 1);
    }

    #[test]
    fn test_remote_hit_is_persisted_to_global() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.2.0", "Reviews code"));

        let remote = session(&env, &registry)
            .resolve(ArtifactKind::Agent, "reviewer")
            .unwrap();
        env.assert_file_exists(env.global_path("agent", "reviewer", "1.2.0"));
        env.assert_file_contains(env.manifest_path("agent", "reviewer"), "\"installedVersions\"");

        let global = offline_session(&env)
            .resolve(ArtifactKind::Agent, "reviewer")
            .unwrap();
        assert_eq!(global.source_tier, Tier::Global);
        assert_eq!(global.integrity_hash, remote.integrity_hash);
        assert_eq!(global.definition, remote.definition);
    }

    #[test]
    fn test_global_hit_skips_remote() {
        let env = TestForge::new();
        env.write_global("tool", "linter", "2.3.1", &definition_yaml("linter", "2.3.1", "Lints"));
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Tool, definition("linter", "2.9.0", "Lints"));

        let resolved = session(&env, &registry)
            .resolve(ArtifactKind::Tool, "linter@^2")
            .unwrap();

        assert_eq!(resolved.version, Version::new(2, 3, 1));
        assert_eq!(resolved.source_tier, Tier::Global);
        assert_eq!(registry.calls(), 0);
    }

    #[test]
    fn test_local_definition_overrides_any_constraint() {
        let env = TestForge::new();
        env.write_local("tool", "linter", &definition_yaml("linter", "0.1.0", "Patched locally"));
        env.write_global("tool", "linter", "2.0.0", &definition_yaml("linter", "2.0.0", "Lints"));

        let resolved = offline_session(&env)
            .resolve(ArtifactKind::Tool, "linter@^2")
            .unwrap();

        assert_eq!(resolved.source_tier, Tier::Local);
        assert_eq!(resolved.version, Version::new(0, 1, 0));
    }

    #[test]
    fn test_custom_tier_order_is_respected() {
        let env = TestForge::new();
        env.write_global("agent", "reviewer", "1.0.0", &definition_yaml("reviewer", "1.0.0", "Old"));
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.5.0", "New"));

        let forge = Forge::builder(handle(&env).with_tier_order(vec![Tier::Remote, Tier::Global, Tier::Local]))
            .client(registry.clone())
            .build()
            .unwrap();
        assert_eq!(forge.resolver().tier_order(), vec![Tier::Remote, Tier::Global, Tier::Local]);

        let resolved = forge.resolve(ArtifactKind::Agent, "reviewer").unwrap();
        assert_eq!(resolved.version, Version::new(1, 5, 0));
        assert_eq!(resolved.source_tier, Tier::Remote);
    }
}

mod failures {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_local_without_version_fails_before_other_tiers() {
        let env = TestForge::new();
        env.write_local("agent", "solo", "name: solo\ndescription: Works alone\n");
        env.write_global("agent", "solo", "1.0.0", &definition_yaml("solo", "1.0.0", "Works alone"));
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("solo", "1.0.0", "Works alone"));

        let err = session(&env, &registry)
            .resolve(ArtifactKind::Agent, "solo")
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }), "got: {err}");
        assert!(err.to_string().contains("version"));
        assert_eq!(registry.calls(), 0);
    }

    #[test]
    fn test_local_name_must_match_file() {
        let env = TestForge::new();
        env.write_local("agent", "alpha", &definition_yaml("beta", "1.0.0", "Misnamed"));

        let err = offline_session(&env)
            .resolve(ArtifactKind::Agent, "alpha")
            .unwrap_err();
        assert!(err.to_string().contains("declares name 'beta'"), "got: {err}");
    }

    #[test]
    fn test_absent_name_makes_exactly_one_remote_lookup() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();

        let err = session(&env, &registry)
            .resolve(ArtifactKind::Agent, "ghost")
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("searched local, global, remote"), "got: {err}");
        assert_eq!(registry.manifest_calls(), 1);
        assert_eq!(registry.artifact_calls(), 0);
    }

    #[test]
    fn test_unreachable_remote_surfaces_when_nothing_else_matches() {
        let env = TestForge::new();
        env.write_global("agent", "reviewer", "1.0.0", &definition_yaml("reviewer", "1.0.0", "Old"));
        let registry = FakeRegistry::new();
        registry.go_offline();
        let forge = session(&env, &registry);

        assert!(forge.resolve(ArtifactKind::Agent, "reviewer@^1").is_ok());
        let err = forge.resolve(ArtifactKind::Agent, "reviewer@^2").unwrap_err();
        assert!(err.is_remote_unavailable(), "got: {err}");
    }

    #[test]
    fn test_unreachable_remote_is_soft_when_consulted_first() {
        let env = TestForge::new();
        env.write_global("agent", "reviewer", "1.0.0", &definition_yaml("reviewer", "1.0.0", "Old"));
        let registry = FakeRegistry::new();
        registry.go_offline();

        let forge = Forge::builder(handle(&env).with_tier_order(vec![Tier::Remote, Tier::Global]))
            .client(registry.clone())
            .build()
            .unwrap();
        let resolved = forge.resolve(ArtifactKind::Agent, "reviewer").unwrap();

        assert_eq!(resolved.source_tier, Tier::Global);
        assert_eq!(registry.manifest_calls(), 1);
    }

    #[test]
    fn test_disabled_remote_is_never_called() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        let forge = Forge::builder(handle(&env).with_remote_enabled(false))
            .client(registry.clone())
            .build()
            .unwrap();

        let err = forge.resolve(ArtifactKind::Tool, "ghost").unwrap_err();
        assert!(err.to_string().contains("searched local, global)"), "got: {err}");
        assert_eq!(registry.calls(), 0);
    }
}

mod versions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deprecated_versions_only_match_exact_pins() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Tool, definition("fmt", "1.0.0", "Formats"));
        registry.publish(ArtifactKind::Tool, definition("fmt", "1.1.0", "Formats"));
        registry.deprecate(ArtifactKind::Tool, "fmt", "1.1.0");
        let forge = session(&env, &registry);

        let latest = forge.resolve(ArtifactKind::Tool, "fmt").unwrap();
        assert_eq!(latest.version, Version::new(1, 0, 0));

        let pinned = forge.resolve(ArtifactKind::Tool, "fmt@1.1.0").unwrap();
        assert_eq!(pinned.version, Version::new(1, 1, 0));
    }

    #[test]
    fn test_global_picks_highest_satisfying_version() {
        let env = TestForge::new();
        for version in ["1.0.0", "1.4.2", "2.0.0"] {
            env.write_global("tool", "fmt", version, &definition_yaml("fmt", version, "Formats"));
        }
        let forge = offline_session(&env);

        assert_eq!(forge.resolve(ArtifactKind::Tool, "fmt@^1").unwrap().version, Version::new(1, 4, 2));
        assert_eq!(forge.resolve(ArtifactKind::Tool, "fmt@~1.0").unwrap().version, Version::new(1, 0, 0));
        assert_eq!(forge.resolve(ArtifactKind::Tool, "fmt").unwrap().version, Version::new(2, 0, 0));
    }

    #[test]
    fn test_resolve_all_keeps_input_order() {
        let env = TestForge::new();
        env.write_global("tool", "a", "1.0.0", &definition_yaml("a", "1.0.0", "A"));
        env.write_global("tool", "b", "2.0.0", &definition_yaml("b", "2.0.0", "B"));
        let forge = offline_session(&env);

        let references = vec!["b".parse().unwrap(), "missing".parse().unwrap(), "a".parse().unwrap()];
        let results = forge.resolver().resolve_all(ArtifactKind::Tool, &references);

        assert_eq!(results[0].as_ref().unwrap().name(), "b");
        assert!(results[1].as_ref().unwrap_err().is_not_found());
        assert_eq!(results[2].as_ref().unwrap().name(), "a");
    }
}

mod catalog {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_has_artifact_maps_not_found_to_false() {
        let env = TestForge::new();
        env.write_local("agent", "helper", &definition_yaml("helper", "0.3.0", "Helps"));
        let forge = offline_session(&env);

        assert!(forge.has_artifact(ArtifactKind::Agent, "helper").unwrap());
        assert!(!forge.has_artifact(ArtifactKind::Agent, "stranger").unwrap());
        assert!(!forge.has_artifact(ArtifactKind::Tool, "helper").unwrap());
    }

    #[test]
    fn test_has_artifact_propagates_validation_errors() {
        let env = TestForge::new();
        env.write_local("agent", "broken", "name: broken\n");
        let forge = offline_session(&env);

        assert!(forge.has_artifact(ArtifactKind::Agent, "broken").is_err());
    }

    #[test]
    fn test_artifact_info_includes_manifest_summary() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.0.0", "Reviews code"));
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.2.0", "Reviews code"));
        let forge = session(&env, &registry);

        let info = forge.artifact_info(ArtifactKind::Agent, "reviewer@~1.0").unwrap();

        assert_eq!(info.version, Version::new(1, 0, 0));
        assert_eq!(info.tier, Tier::Remote);
        assert_eq!(info.description.as_deref(), Some("Reviews code"));
        let summary = info.manifest.expect("Should carry a manifest summary");
        assert_eq!(summary.latest.as_deref(), Some("1.2.0"));
        assert_eq!(summary.installed_versions, vec!["1.0.0".to_string()]);
        assert!(summary.update_available);
    }

    #[test]
    fn test_list_reports_every_tier() {
        let env = TestForge::new();
        env.write_local("agent", "helper", &definition_yaml("helper", "0.3.0", "Helps"));
        env.write_global("agent", "reviewer", "1.0.0", &definition_yaml("reviewer", "1.0.0", "Reviews"));
        env.write_global("agent", "reviewer", "1.1.0", &definition_yaml("reviewer", "1.1.0", "Reviews"));
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("planner", "3.0.0", "Plans"));
        let forge = session(&env, &registry);

        let all = forge.list(ArtifactKind::Agent, None).unwrap();
        let rows: Vec<(Tier, &str, Option<&str>)> = all
            .iter()
            .map(|l| (l.tier, l.name.as_str(), l.version.as_deref()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (Tier::Local, "helper", Some("0.3.0")),
                (Tier::Global, "reviewer", Some("1.0.0")),
                (Tier::Global, "reviewer", Some("1.1.0")),
                (Tier::Remote, "planner", Some("3.0.0")),
            ]
        );

        let global_only = forge.list(ArtifactKind::Agent, Some(Tier::Global)).unwrap();
        assert!(global_only.iter().all(|l| l.tier == Tier::Global));
        assert!(forge.list(ArtifactKind::Tool, None).unwrap().is_empty());
    }

    #[test]
    fn test_list_survives_unreachable_remote() {
        let env = TestForge::new();
        env.write_local("agent", "helper", &definition_yaml("helper", "0.3.0", "Helps"));
        let registry = FakeRegistry::new();
        registry.go_offline();

        let listed = session(&env, &registry).list(ArtifactKind::Agent, None).unwrap();
        assert_eq!(listed.len(), 1);
    }
}

mod install {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_install_then_uninstall_updates_manifest() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Tool, definition("linter", "2.3.1", "Lints"));
        let forge = session(&env, &registry);

        let installed = forge.install(ArtifactKind::Tool, "linter@2.3.1").unwrap();
        assert_eq!(installed.source_tier, Tier::Remote);
        env.assert_file_exists(env.global_path("tool", "linter", "2.3.1"));

        forge.uninstall(ArtifactKind::Tool, "linter", &Version::new(2, 3, 1)).unwrap();
        env.assert_file_not_exists(env.global_path("tool", "linter", "2.3.1"));

        let manifest: Manifest = serde_json::from_str(&env.read(env.manifest_path("tool", "linter"))).unwrap();
        assert!(manifest.installed_versions.is_empty());
        assert_eq!(manifest.active_version, None);

        let err = forge
            .uninstall(ArtifactKind::Tool, "linter", &Version::new(2, 3, 1))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_uninstall_rejects_path_like_names() {
        let env = TestForge::new();
        let path = env.write_global("tool", "linter", "1.0.0", &definition_yaml("linter", "1.0.0", "Lints"));
        let forge = offline_session(&env);

        for name in ["../tools/linter", "linter/../linter", ""] {
            let err = forge
                .uninstall(ArtifactKind::Tool, name, &Version::new(1, 0, 0))
                .unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "{name:?} gave: {err}");
        }
        env.assert_file_exists(&path);
    }

    #[test]
    fn test_install_ignores_local_override() {
        let env = TestForge::new();
        env.write_local("tool", "linter", &definition_yaml("linter", "0.0.1", "Local"));
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Tool, definition("linter", "2.3.1", "Lints"));

        let installed = session(&env, &registry)
            .install(ArtifactKind::Tool, "linter")
            .unwrap();
        assert_eq!(installed.version, Version::new(2, 3, 1));
    }

    #[test]
    fn test_manifest_refreshes_after_ttl() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.0.0", "Reviews"));
        let (forge, clock) = session_with_clock(&env, &registry);

        forge.resolve(ArtifactKind::Agent, "reviewer").unwrap();
        assert_eq!(registry.manifest_calls(), 1);

        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.1.0", "Reviews"));
        let fresh = forge.refresh_manifest(ArtifactKind::Agent, "reviewer").unwrap().unwrap();
        assert_eq!(registry.manifest_calls(), 1);
        assert_eq!(fresh.latest.as_deref(), Some("1.0.0"));
        assert_eq!(fresh.installed_versions, vec!["1.0.0".to_string()]);

        clock.advance(chrono::Duration::hours(2));
        let refreshed = forge.refresh_manifest(ArtifactKind::Agent, "reviewer").unwrap().unwrap();
        assert_eq!(registry.manifest_calls(), 2);
        assert_eq!(refreshed.latest.as_deref(), Some("1.1.0"));
        assert!(refreshed.update_available);
    }

    #[test]
    fn test_invalidate_cache_forces_refetch() {
        let env = TestForge::new();
        let registry = FakeRegistry::new();
        registry.publish(ArtifactKind::Agent, definition("reviewer", "1.0.0", "Reviews"));
        let forge = session(&env, &registry);

        forge.refresh_manifest(ArtifactKind::Agent, "reviewer").unwrap();
        forge.invalidate_cache(None).unwrap();
        forge.refresh_manifest(ArtifactKind::Agent, "reviewer").unwrap();
        assert_eq!(registry.manifest_calls(), 2);
    }
}
