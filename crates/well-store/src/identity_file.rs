//! Local identity cache: one line holding the person id of this machine's user.

use crate::StoreError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use well_core::{CollabError, IdentityCache, PersonId};

#[derive(Debug, Clone)]
pub struct IdentityFile {
    path: PathBuf,
}

impl IdentityFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached id; a missing or blank file means none.
    pub fn load(&self) -> Result<Option<PersonId>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store(&self, id: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", id.trim()))?;
        Ok(())
    }
}

impl IdentityCache for IdentityFile {
    fn read(&mut self) -> Result<Option<PersonId>, CollabError> {
        Ok(self.load()?)
    }

    fn write(&mut self, id: &str) -> Result<(), CollabError> {
        Ok(self.store(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = IdentityFile::new(dir.path().join("person_id"));
        assert_eq!(cache.read().unwrap(), None);
    }

    #[test]
    fn test_write_creates_parent_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = IdentityFile::new(dir.path().join(".well").join("person_id"));
        cache.write("abc-123").unwrap();
        assert_eq!(cache.read().unwrap().as_deref(), Some("abc-123"));

        cache.write("def-456").unwrap();
        assert_eq!(cache.read().unwrap().as_deref(), Some("def-456"));
    }

    #[test]
    fn test_trims_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person_id");
        std::fs::write(&path, "  abc \n\n").unwrap();
        assert_eq!(IdentityFile::new(&path).load().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_blank_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person_id");
        std::fs::write(&path, " \n").unwrap();
        assert_eq!(IdentityFile::new(&path).load().unwrap(), None);
    }

    #[test]
    fn test_unreadable_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let mut cache = IdentityFile::new(dir.path());
        assert!(matches!(cache.read(), Err(CollabError::Unavailable(_))));
    }
}
