//! On-disk access to the project and global tiers

use crate::handle::RegistryHandle;
use crate::{Error, Result};
use forge_fs::{DocumentStore, io};
use forge_meta::{ArtifactDefinition, ArtifactKind, Manifest, compare_versions, parse_version};
use semver::Version;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A definition together with the exact bytes it was read from.
#[derive(Debug, Clone)]
pub struct StoredDefinition {
    pub definition: ArtifactDefinition,
    pub bytes: Vec<u8>,
    pub path: PathBuf,
}

/// Read and parse a definition file, `None` if it does not exist.
pub fn read_definition(path: &Path) -> Result<Option<StoredDefinition>> {
    let bytes = match io::read_bytes(path) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let text = String::from_utf8_lossy(&bytes);
    let definition = ArtifactDefinition::from_yaml(path, &text)
        .map_err(|e| Error::validation(path.display(), e))?;
    Ok(Some(StoredDefinition {
        definition,
        bytes,
        path: path.to_path_buf(),
    }))
}

/// The project tier: one definition file per name.
#[derive(Debug, Clone)]
pub struct LocalStore {
    handle: RegistryHandle,
}

impl LocalStore {
    pub fn new(handle: RegistryHandle) -> Self {
        Self { handle }
    }

    pub fn path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        self.handle.local_definition_path(kind, name)
    }

    pub fn read(&self, kind: ArtifactKind, name: &str) -> Result<Option<StoredDefinition>> {
        read_definition(&self.path(kind, name))
    }

    pub fn exists(&self, kind: ArtifactKind, name: &str) -> bool {
        self.path(kind, name).is_file()
    }

    /// Write a definition atomically, returning the stored bytes.
    pub fn write(&self, kind: ArtifactKind, definition: &ArtifactDefinition) -> Result<Vec<u8>> {
        let content = definition.to_yaml()?;
        io::write_atomic(&self.path(kind, &definition.name), content.as_bytes())?;
        Ok(content.into_bytes())
    }

    /// Names of every local definition file of `kind`, sorted.
    pub fn names(&self, kind: ArtifactKind) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let root = self.handle.local_kind_dir(kind);
        collect_yaml_names(&root, None, &mut names)?;
        names.sort();
        Ok(names)
    }
}

fn collect_yaml_names(dir: &Path, scope: Option<&str>, names: &mut Vec<String>) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(forge_fs::Error::io(dir, e).into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() && scope.is_none() && file_name.starts_with('@') {
            collect_yaml_names(&path, Some(&file_name), names)?;
        } else if let Some(stem) = file_name.strip_suffix(".yaml") {
            names.push(match scope {
                Some(scope) => format!("{scope}/{stem}"),
                None => stem.to_string(),
            });
        }
    }
    Ok(())
}

/// The global tier: versioned definitions plus per-name manifests.
#[derive(Debug, Clone)]
pub struct GlobalStore {
    handle: RegistryHandle,
    documents: DocumentStore,
}

impl GlobalStore {
    pub fn new(handle: RegistryHandle) -> Self {
        Self {
            handle,
            documents: DocumentStore::new(),
        }
    }

    pub fn path(&self, kind: ArtifactKind, name: &str, version: &Version) -> PathBuf {
        self.handle.global_definition_path(kind, name, version)
    }

    pub fn read(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<Option<StoredDefinition>> {
        read_definition(&self.path(kind, name, version))
    }

    /// Store `definition` as `name@version`, returning the stored bytes.
    pub fn write(&self, kind: ArtifactKind, definition: &ArtifactDefinition, version: &Version) -> Result<Vec<u8>> {
        let content = definition.to_yaml()?;
        io::write_atomic(&self.path(kind, &definition.name, version), content.as_bytes())?;
        Ok(content.into_bytes())
    }

    /// Remove one stored version. Returns whether it existed.
    pub fn remove(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<bool> {
        let path = self.path(kind, name, version);
        let removed = io::remove_if_exists(&path)?;
        if let Some(dir) = path.parent() {
            match std::fs::remove_dir(dir) {
                Ok(()) => {}
                // Something else still lives there, or it was never created.
                Err(e) if matches!(e.kind(), ErrorKind::DirectoryNotEmpty | ErrorKind::NotFound) => {}
                Err(e) => return Err(forge_fs::Error::io(dir, e).into()),
            }
        }
        Ok(removed)
    }

    /// Versions of `name` physically present, ascending.
    pub fn versions(&self, kind: ArtifactKind, name: &str) -> Result<Vec<Version>> {
        let dir = self.handle.global_versions_dir(kind, name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(forge_fs::Error::io(&dir, e).into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            let raw = entry.file_name().to_string_lossy().into_owned();
            match parse_version(&raw) {
                Ok(version) if entry.path().join("definition.yaml").is_file() => versions.push(version),
                Ok(_) => {}
                Err(_) => tracing::warn!(kind = %kind, name, dir = %raw, "ignoring non-version directory"),
            }
        }
        versions.sort_by(compare_versions);
        Ok(versions)
    }

    /// Names with at least one directory in the global tier, sorted.
    pub fn names(&self, kind: ArtifactKind) -> Result<Vec<String>> {
        let root = self.handle.global_kind_dir(kind);
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(forge_fs::Error::io(&root, e).into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('@') {
                for scoped in std::fs::read_dir(entry.path())? {
                    let scoped = scoped?;
                    if scoped.path().is_dir() {
                        names.push(format!("{name}/{}", scoped.file_name().to_string_lossy()));
                    }
                }
            } else {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        Ok(self.documents.load_optional(&self.handle.manifest_path(kind, name))?)
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        self.documents
            .save(&self.handle.manifest_path(manifest.kind, &manifest.name), manifest)?;
        Ok(())
    }

    /// Load the manifest for `name`, or start an empty one.
    pub fn manifest_or_new(&self, kind: ArtifactKind, name: &str) -> Result<Manifest> {
        Ok(self
            .load_manifest(kind, name)?
            .unwrap_or_else(|| Manifest::new(name, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn stores() -> (TempDir, LocalStore, GlobalStore) {
        let dir = TempDir::new().unwrap();
        let handle = RegistryHandle::for_dirs(dir.path().join("project"), dir.path().join("global"));
        (dir, LocalStore::new(handle.clone()), GlobalStore::new(handle))
    }

    #[test]
    fn global_versions_sorted_and_filtered() {
        let (_dir, _, global) = stores();
        for v in ["1.10.0", "1.2.0", "0.9.0"] {
            let version = Version::parse(v).unwrap();
            let def = ArtifactDefinition::new("linter", &version, "Lints");
            global.write(ArtifactKind::Tool, &def, &version).unwrap();
        }
        std::fs::create_dir_all(global.path(ArtifactKind::Tool, "linter", &Version::new(3, 0, 0)).parent().unwrap())
            .unwrap();

        let versions: Vec<String> = global
            .versions(ArtifactKind::Tool, "linter")
            .unwrap()
            .iter()
            .map(Version::to_string)
            .collect();
        assert_eq!(versions, vec!["0.9.0", "1.2.0", "1.10.0"]);
        assert_eq!(global.names(ArtifactKind::Tool).unwrap(), vec!["linter"]);
    }

    #[test]
    fn remove_prunes_empty_version_dir() {
        let (_dir, _, global) = stores();
        let (v1, v2) = (Version::new(1, 0, 0), Version::new(2, 0, 0));
        for v in [&v1, &v2] {
            global.write(ArtifactKind::Tool, &ArtifactDefinition::new("linter", v, "Lints"), v).unwrap();
        }
        let stray = global.path(ArtifactKind::Tool, "linter", &v2).with_file_name("notes.txt");
        std::fs::write(&stray, "keep").unwrap();

        assert!(global.remove(ArtifactKind::Tool, "linter", &v1).unwrap());
        assert!(!global.path(ArtifactKind::Tool, "linter", &v1).parent().unwrap().exists());

        assert!(global.remove(ArtifactKind::Tool, "linter", &v2).unwrap());
        assert!(stray.exists());
        assert!(!global.remove(ArtifactKind::Tool, "linter", &v1).unwrap());
    }

    #[test]
    fn local_names_include_scoped() {
        let (_dir, local, _) = stores();
        let v = Version::new(1, 0, 0);
        local.write(ArtifactKind::Agent, &ArtifactDefinition::new("reviewer", &v, "R")).unwrap();
        local.write(ArtifactKind::Agent, &ArtifactDefinition::new("@acme/helper", &v, "H")).unwrap();
        assert_eq!(local.names(ArtifactKind::Agent).unwrap(), vec!["@acme/helper", "reviewer"]);
        assert!(local.names(ArtifactKind::Tool).unwrap().is_empty());
    }

    #[test]
    fn unparsable_definition_is_a_validation_error() {
        let (_dir, local, _) = stores();
        let path = local.path(ArtifactKind::Agent, "broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "name: [broken\n").unwrap();
        assert!(matches!(local.read(ArtifactKind::Agent, "broken"), Err(Error::Validation { .. })));
    }
}
