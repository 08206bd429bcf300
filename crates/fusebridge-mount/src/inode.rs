//! Inode ↔ path mapping.
//!
//! The kernel speaks inode numbers; handlers speak absolute paths. Inodes are
//! handed out on first sight of a path and never reused for the life of the
//! mount.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::constants::ROOT_INODE;

#[derive(Debug)]
struct Inner {
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    next: u64,
}

#[derive(Debug)]
pub struct InodeTable {
    inner: RwLock<Inner>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// A table holding only the root.
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        let mut inodes = HashMap::new();
        paths.insert(ROOT_INODE, "/".to_string());
        inodes.insert("/".to_string(), ROOT_INODE);
        Self {
            inner: RwLock::new(Inner {
                paths,
                inodes,
                next: ROOT_INODE + 1,
            }),
        }
    }

    pub fn path(&self, ino: u64) -> Option<String> {
        self.inner.read().paths.get(&ino).cloned()
    }

    pub fn inode(&self, path: &str) -> Option<u64> {
        self.inner.read().inodes.get(path).copied()
    }

    /// The inode for `path`, assigning a fresh one if unseen.
    pub fn get_or_insert(&self, path: &str) -> u64 {
        if let Some(ino) = self.inode(path) {
            return ino;
        }

        let mut inner = self.inner.write();
        // Raced with another inserter between the locks.
        if let Some(&ino) = inner.inodes.get(path) {
            return ino;
        }
        let ino = inner.next;
        inner.next += 1;
        inner.paths.insert(ino, path.to_string());
        inner.inodes.insert(path.to_string(), ino);
        tracing::trace!(ino, path, "inode assigned");
        ino
    }

    pub fn len(&self) -> usize {
        self.inner.read().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Join a directory path and an entry name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// The containing directory of `path`. The root is its own parent.
pub fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}
