//! The manifest: an ordered set of paths defining archive membership.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::{ArchiveError, MissingPolicy};

/// Ordered, duplicate-free list of relative paths plus the root they
/// resolve against.
///
/// Entry order is the archive write order. The same manifest can be used
/// with a different root on the extracting side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    root: PathBuf,
    policy: MissingPolicy,
    entries: Vec<String>,
}

impl Manifest {
    /// An empty manifest rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: MissingPolicy::default(),
            entries: Vec::new(),
        }
    }

    /// Read a manifest list: one path per line, no escaping.
    ///
    /// Blank lines are entries too. Duplicate lines collapse into the first
    /// occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Manifest`] if the list cannot be read.
    pub fn load(path: &Path, root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let manifest_err = |source| ArchiveError::Manifest {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(manifest_err)?;
        let mut manifest = Self::new(root);
        for line in BufReader::new(file).lines() {
            let line = line.map_err(manifest_err)?;
            debug!(manifest = %path.display(), path = %line, "adding path to manifest");
            manifest.add(line);
        }

        Ok(manifest)
    }

    /// Set how absent entries are treated.
    pub fn with_policy(mut self, policy: MissingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Append `path` unless it is already listed.
    pub fn add(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.has(&path) {
            self.entries.push(path);
        }
    }

    /// Whether `path` is listed verbatim.
    pub fn has(&self, path: &str) -> bool {
        self.entries.iter().any(|p| p == path)
    }

    /// Absolute location of an entry.
    ///
    /// Local paths (relative and not escaping upwards) are joined onto the
    /// root; anything else is returned unchanged.
    pub fn resolve(&self, path: &str) -> PathBuf {
        if is_local(Path::new(path)) {
            let abs = self.root.join(path);
            debug!(rel = path, abs = %abs.display(), "resolved relative path");
            abs
        } else {
            PathBuf::from(path)
        }
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Base directory for relative entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current missing-entry policy.
    pub fn policy(&self) -> MissingPolicy {
        self.policy
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Same test as Go's `filepath.IsLocal`: non-empty, relative, and never
/// climbing above its starting directory.
fn is_local(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }

    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Key used to match archive entry names against manifest entries.
///
/// The tar writer normalizes names (`./a`, `a/`, `a//b`), so matching is
/// component-wise rather than byte-wise.
pub(crate) fn entry_key(name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_add_is_idempotent_and_ordered() {
        let mut m = Manifest::new("/srv");
        m.add("b");
        m.add("a");
        m.add("b");
        m.add("c");
        assert_eq!(m.entries(), ["b", "a", "c"]);
        assert!(m.has("a"));
        assert!(!m.has("d"));
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_resolve_relative_joins_root() {
        let m = Manifest::new("/srv/site");
        assert_eq!(m.resolve("etc/app.conf"), Path::new("/srv/site/etc/app.conf"));
        assert_eq!(m.resolve("a/../b"), Path::new("/srv/site/a/../b"));
    }

    #[test]
    fn test_resolve_non_local_unchanged() {
        let m = Manifest::new("/srv/site");
        assert_eq!(m.resolve("/etc/passwd"), Path::new("/etc/passwd"));
        assert_eq!(m.resolve("../escape"), Path::new("../escape"));
        assert_eq!(m.resolve("a/../../b"), Path::new("a/../../b"));
        assert_eq!(m.resolve(""), Path::new(""));
    }

    #[test]
    fn test_is_local() {
        assert!(is_local(Path::new("foo")));
        assert!(is_local(Path::new("./foo/bar")));
        assert!(is_local(Path::new("foo/..")));
        assert!(!is_local(Path::new("..")));
        assert!(!is_local(Path::new("/foo")));
        assert!(!is_local(Path::new("")));
    }

    #[test]
    fn test_entry_key_normalizes() {
        assert_eq!(entry_key("./dir/"), entry_key("dir"));
        assert_eq!(entry_key("a//b"), entry_key("a/b"));
        assert_ne!(entry_key("a"), entry_key("b"));
    }

    #[test]
    fn test_load_lines() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("manifest");
        fs::write(&list, "bin/tool\n\netc/conf\nbin/tool\r\nshare\n").unwrap();

        let m = Manifest::load(&list, "/srv").unwrap();
        assert_eq!(m.entries(), ["bin/tool", "", "etc/conf", "share"]);
        assert_eq!(m.root(), Path::new("/srv"));
        assert_eq!(m.policy(), MissingPolicy::Fail);
    }

    #[test]
    fn test_load_missing_list() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("noent"), "/srv").unwrap_err();
        assert!(matches!(err, ArchiveError::Manifest { .. }));
    }
}
