//! Document storage - where documents and their referenced notes live.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use log::{debug, warn};

use crate::error::{QuillError, Result};
use crate::tools::{fold_components, resolve_existing_prefix};

/// Storage for documents and the files they reference.
pub trait DocumentStore: Send + Sync {
    /// Read a document as text.
    fn read(&self, path: &Path) -> Result<String>;

    /// Replace a document's whole body.
    fn write(&self, path: &Path, text: &str) -> Result<()>;

    /// Resolve a link name (`Note`, `Note.md`, `folder/Note`) to a path.
    fn resolve_link(&self, name: &str) -> Option<PathBuf>;

    /// Read a referenced file as bytes (images, PDFs).
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Documents on disk under a vault root.
///
/// Every path is confined to the root. `..` and symlinks that lead out of it
/// are refused, as are absolute paths elsewhere, unless the path was opened
/// with [`FsDocumentStore::with_document`].
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    documents: Vec<PathBuf>,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            documents: Vec::new(),
        }
    }

    /// Allow one document outside the root, such as the file being processed.
    pub fn with_document(mut self, path: impl AsRef<Path>) -> Self {
        self.documents.push(resolve(path.as_ref()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> Result<PathBuf> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = resolve(&joined);

        let root = self
            .root
            .canonicalize()
            .map_err(|e| QuillError::Storage(format!("vault root {}: {}", self.root.display(), e)))?;
        if resolved.starts_with(&root) || self.documents.contains(&resolved) {
            return Ok(resolved);
        }

        warn!("Refused {} outside vault {}", path.display(), root.display());
        Err(QuillError::Storage(format!(
            "Path must be under {}: {}",
            self.root.display(),
            path.display()
        )))
    }

    fn search(&self, file_name: &str) -> Option<PathBuf> {
        let root = self.root.to_str()?;
        let pattern = format!("{}/**/{}", glob::Pattern::escape(root), glob::Pattern::escape(file_name));
        let mut matches: Vec<PathBuf> = glob::glob(&pattern).ok()?.filter_map(|r| r.ok()).collect();
        // Shallowest match wins, then alphabetical
        matches.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });
        matches.into_iter().find(|p| p.is_file())
    }
}

fn resolve(path: &Path) -> PathBuf {
    resolve_existing_prefix(&fold_components(path))
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, path: &Path) -> Result<String> {
        let full = self.full_path(path)?;
        fs::read_to_string(&full).map_err(|e| QuillError::Storage(format!("read {}: {}", full.display(), e)))
    }

    /// Write through a temp file in the same directory, then rename over the target.
    fn write(&self, path: &Path, text: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let dir = full.parent().unwrap_or(&self.root);
        let file_name = full
            .file_name()
            .ok_or_else(|| QuillError::Storage(format!("not a file path: {}", full.display())))?;
        let tmp = dir.join(format!(".{}.quill-tmp", file_name.to_string_lossy()));

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &full).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            QuillError::Storage(format!("write {}: {}", full.display(), e))
        })?;

        debug!("Wrote {} ({} bytes)", full.display(), text.len());
        Ok(())
    }

    fn resolve_link(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut candidates = vec![name.to_string()];
        if Path::new(name).extension().is_none() {
            candidates.push(format!("{}.md", name));
        }

        for candidate in &candidates {
            let direct = self.root.join(candidate);
            if direct.is_file() {
                return Some(direct);
            }
        }

        // Bare names are searched anywhere in the vault
        if name.contains('/') {
            return None;
        }
        candidates.iter().find_map(|c| self.search(c))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.full_path(path)?;
        fs::read(&full).map_err(|e| QuillError::Storage(format!("read {}: {}", full.display(), e)))
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
    writes: RwLock<Vec<(PathBuf, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| QuillError::Storage(format!("{} is not UTF-8", path.display())))
    }

    fn write(&self, path: &Path, text: &str) -> Result<()> {
        self.insert(path, text.as_bytes().to_vec());
        self.writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_path_buf(), text.to_string()));
        Ok(())
    }

    fn resolve_link(&self, name: &str) -> Option<PathBuf> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let with_md = format!("{}.md", name);
        [name, with_md.as_str()]
            .iter()
            .map(PathBuf::from)
            .find(|p| files.contains_key(p))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| QuillError::Storage(format!("{} not found", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fs_write_and_read() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        store.write(Path::new("doc.md"), "hello").unwrap();
        assert_eq!(store.read(Path::new("doc.md")).unwrap(), "hello");

        store.write(Path::new("doc.md"), "replaced").unwrap();
        assert_eq!(store.read(Path::new("doc.md")).unwrap(), "replaced");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".quill-tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_fs_read_missing_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        assert!(matches!(store.read(Path::new("nope.md")), Err(QuillError::Storage(_))));
    }

    #[test]
    fn test_fs_refuses_paths_outside_the_vault() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("id_rsa"), "secret").unwrap();
        let vault = tempdir().unwrap();
        fs::create_dir_all(vault.path().join("notes")).unwrap();
        fs::write(vault.path().join("notes/Inside.md"), "ok").unwrap();
        let store = FsDocumentStore::new(vault.path().join("notes"));

        let absolute = outside.path().join("id_rsa");
        assert!(matches!(store.read(&absolute), Err(QuillError::Storage(_))));
        assert!(matches!(store.read_bytes(&absolute), Err(QuillError::Storage(_))));
        assert!(store.read(Path::new("../notes/../../x")).is_err());
        assert!(store.write(Path::new("../escaped.md"), "x").is_err());
        assert!(!vault.path().join("escaped.md").exists());

        assert_eq!(store.read(Path::new("sub/../Inside.md")).unwrap(), "ok");
        assert_eq!(store.read(&vault.path().join("notes/Inside.md")).unwrap(), "ok");
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_refuses_symlink_out_of_the_vault() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let vault = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), vault.path().join("link")).unwrap();
        let store = FsDocumentStore::new(vault.path());

        assert!(store.read(Path::new("link/secret.txt")).is_err());
    }

    #[test]
    fn test_fs_opened_document_outside_the_vault() {
        let vault = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let doc = elsewhere.path().join("doc.md");
        fs::write(&doc, "body").unwrap();
        let store = FsDocumentStore::new(vault.path()).with_document(&doc);

        assert_eq!(store.read(&doc).unwrap(), "body");
        store.write(&doc, "new").unwrap();
        assert_eq!(fs::read_to_string(&doc).unwrap(), "new");
        assert!(store.read(&elsewhere.path().join("other.md")).is_err());
    }

    #[test]
    fn test_fs_resolve_link() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("deep/er")).unwrap();
        fs::write(dir.path().join("Top.md"), "").unwrap();
        fs::write(dir.path().join("deep/er/Ideas.md"), "").unwrap();
        fs::write(dir.path().join("deep/chart.png"), "").unwrap();
        let store = FsDocumentStore::new(dir.path());

        assert_eq!(store.resolve_link("Top"), Some(dir.path().join("Top.md")));
        assert_eq!(store.resolve_link("Top.md"), Some(dir.path().join("Top.md")));
        assert_eq!(store.resolve_link("Ideas"), Some(dir.path().join("deep/er/Ideas.md")));
        assert_eq!(store.resolve_link("chart.png"), Some(dir.path().join("deep/chart.png")));
        assert_eq!(store.resolve_link("deep/er/Ideas"), Some(dir.path().join("deep/er/Ideas.md")));
        assert_eq!(store.resolve_link("Missing"), None);
        assert_eq!(store.resolve_link(""), None);
    }

    #[test]
    fn test_fs_resolve_prefers_shallowest() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join("z")).unwrap();
        fs::write(dir.path().join("a/b/Note.md"), "").unwrap();
        fs::write(dir.path().join("z/Note.md"), "").unwrap();
        let store = FsDocumentStore::new(dir.path());

        assert_eq!(store.resolve_link("Note"), Some(dir.path().join("z/Note.md")));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new().with_file("Note.md", "body");
        assert_eq!(store.resolve_link("Note"), Some(PathBuf::from("Note.md")));
        assert_eq!(store.read(Path::new("Note.md")).unwrap(), "body");

        store.write(Path::new("out.md"), "x").unwrap();
        assert_eq!(store.writes(), vec![(PathBuf::from("out.md"), "x".to_string())]);
        assert!(store.read(Path::new("missing.md")).is_err());
    }
}
