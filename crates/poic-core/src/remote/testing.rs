//! In-memory `RemoteFiles` fake for store and engine tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

use super::{RemoteEntry, RemoteFiles};

#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    pub text: String,
    pub modified_at: Option<i64>,
}

/// Remote store fake: a path-keyed file map with failure injection and
/// call counters.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    pub files: RefCell<BTreeMap<String, MemoryFile>>,
    pub folders: RefCell<BTreeSet<String>>,
    /// Paths whose writes fail with a transport error
    pub fail_writes: RefCell<BTreeSet<String>>,
    /// When set, every call fails as an auth rejection
    pub reject_auth: Cell<bool>,
    pub write_calls: Cell<usize>,
    pub delete_calls: Cell<usize>,
    pub move_calls: Cell<usize>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, text: &str, modified_at: Option<i64>) {
        self.files.borrow_mut().insert(
            path.to_string(),
            MemoryFile {
                text: text.to_string(),
                modified_at,
            },
        );
    }

    pub fn text_of(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).map(|file| file.text.clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn check_auth(&self) -> Result<()> {
        if self.reject_auth.get() {
            Err(Error::AuthRequired)
        } else {
            Ok(())
        }
    }
}

impl RemoteFiles for MemoryFiles {
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>> {
        self.check_auth()?;
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        let entries = self
            .files
            .borrow()
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, file)| RemoteEntry {
                name: path[prefix.len()..].to_string(),
                path: path.clone(),
                modified_at: file.modified_at,
            })
            .collect();
        Ok(entries)
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        self.check_auth()?;
        self.files
            .borrow()
            .get(path)
            .map(|file| file.text.clone())
            .ok_or_else(|| Error::Remote(format!("path/not_found: {path}")))
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<()> {
        self.check_auth()?;
        self.write_calls.set(self.write_calls.get() + 1);
        if self.fail_writes.borrow().contains(path) {
            return Err(Error::Remote(format!("too_many_write_operations: {path}")));
        }
        self.insert(path, text, None);
        Ok(())
    }

    async fn delete_entry(&self, path: &str) -> Result<()> {
        self.check_auth()?;
        self.delete_calls.set(self.delete_calls.get() + 1);
        self.files.borrow_mut().remove(path);
        Ok(())
    }

    async fn move_entry(&self, from: &str, to: &str) -> Result<()> {
        self.check_auth()?;
        self.move_calls.set(self.move_calls.get() + 1);
        let mut files = self.files.borrow_mut();
        if files.contains_key(to) {
            return Err(Error::Remote(format!("to/conflict: {to}")));
        }
        let Some(file) = files.remove(from) else {
            return Err(Error::Remote(format!("from_lookup/not_found: {from}")));
        };
        files.insert(to.to_string(), file);
        Ok(())
    }

    async fn create_folder(&self, folder: &str) -> Result<()> {
        self.check_auth()?;
        self.folders.borrow_mut().insert(folder.to_string());
        Ok(())
    }
}
