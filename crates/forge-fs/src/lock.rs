//! Advisory exclusive locks guarding read-modify-write cycles

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive advisory lock on a sidecar `<file>.lock` next to the
/// guarded file.
///
/// The lock is released when the guard is dropped. The sidecar file is
/// left in place; only the lock itself carries meaning.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until an exclusive lock for `target` is held.
    pub fn acquire(target: &Path) -> Result<Self> {
        let (file, path) = open_sidecar(target)?;
        file.lock_exclusive()
            .map_err(|_| Error::LockFailed { path: path.clone() })?;
        tracing::debug!(lock = %path.display(), "acquired exclusive lock");
        Ok(Self { file, path })
    }

    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another holder currently owns it.
    pub fn try_acquire(target: &Path) -> Result<Option<Self>> {
        let (file, path) = open_sidecar(target)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(_) => Err(Error::LockFailed { path }),
        }
    }

    /// Path of the sidecar lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_sidecar(target: &Path) -> Result<(File, PathBuf)> {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    let path = target.with_file_name(name);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| Error::io(&path, e))?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("forge.lock");

        let first = FileLock::acquire(&target).unwrap();
        assert!(first.path().ends_with("forge.lock.lock"));
        assert!(FileLock::try_acquire(&target).unwrap().is_none());

        drop(first);
        assert!(FileLock::try_acquire(&target).unwrap().is_some());
    }
}
