//! [`TestForge`] builder for registry test scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A project directory and a global tier directory, both temporary.
///
/// Kinds are passed as their CLI spelling (`"agent"`, `"tool"`).
///
/// # Example
///
/// ```rust,no_run
/// use forge_test_utils::{TestForge, definition_yaml};
///
/// let forge = TestForge::new();
/// forge.write_global("agent", "reviewer", "1.0.0", &definition_yaml("reviewer", "1.0.0", "Reviews"));
/// forge.assert_file_exists(forge.global_dir().join("agents/reviewer/1.0.0/definition.yaml"));
/// ```
pub struct TestForge {
    project: TempDir,
    global: TempDir,
}

impl Default for TestForge {
    fn default() -> Self {
        Self::new()
    }
}

impl TestForge {
    pub fn new() -> Self {
        Self {
            project: TempDir::new().unwrap(),
            global: TempDir::new().unwrap(),
        }
    }

    pub fn project_root(&self) -> &Path {
        self.project.path()
    }

    /// The project tier directory, `<project>/.forge`.
    pub fn local_dir(&self) -> PathBuf {
        self.project.path().join(".forge")
    }

    pub fn global_dir(&self) -> &Path {
        self.global.path()
    }

    pub fn local_path(&self, kind: &str, name: &str) -> PathBuf {
        self.local_dir().join(format!("{kind}s")).join(format!("{name}.yaml"))
    }

    pub fn global_path(&self, kind: &str, name: &str, version: &str) -> PathBuf {
        self.global_dir()
            .join(format!("{kind}s"))
            .join(name)
            .join(version)
            .join("definition.yaml")
    }

    pub fn manifest_path(&self, kind: &str, name: &str) -> PathBuf {
        self.global_dir()
            .join("manifests")
            .join(format!("{kind}s"))
            .join(format!("{name}.json"))
    }

    /// Write a project definition file and return its path.
    pub fn write_local(&self, kind: &str, name: &str, yaml: &str) -> PathBuf {
        let path = self.local_path(kind, name);
        write(&path, yaml);
        path
    }

    /// Write an installed global definition and return its path.
    pub fn write_global(&self, kind: &str, name: &str, version: &str, yaml: &str) -> PathBuf {
        let path = self.global_path(kind, name, version);
        write(&path, yaml);
        path
    }

    pub fn write_manifest(&self, kind: &str, name: &str, json: &str) -> PathBuf {
        let path = self.manifest_path(kind, name);
        write(&path, json);
        path
    }

    /// Write `<project>/.forge/config.yaml`.
    pub fn write_project_config(&self, yaml: &str) -> PathBuf {
        let path = self.local_dir().join("config.yaml");
        write(&path, yaml);
        path
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        fs::read_to_string(path).unwrap_or_else(|e| panic!("could not read {}: {e}", path.display()))
    }

    /// # Panics
    /// Panics with the missing path.
    pub fn assert_file_exists(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(path.exists(), "expected file to exist: {}", path.display());
    }

    pub fn assert_file_not_exists(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(!path.exists(), "expected file NOT to exist: {}", path.display());
    }

    pub fn assert_file_contains(&self, path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        let actual = self.read(path);
        assert!(
            actual.contains(content),
            "file {} does not contain expected content.\nExpected: {}\nActual: {}",
            path.display(),
            content,
            actual
        );
    }
}

/// A minimal valid definition document.
pub fn definition_yaml(name: &str, version: &str, description: &str) -> String {
    format!("name: {name}\nversion: {version}\ndescription: {description}\n")
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
