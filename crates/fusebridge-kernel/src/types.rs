//! Data crossing the dispatch boundary.
//!
//! [`FileHandleInfo`] and [`FileAttributes`] are the plain records handlers
//! see. [`HostFileInfo`] and [`HostStat`] model the host runtime's own
//! per-open-file and metadata records, which carry more fields than handlers
//! are ever shown.

use serde::{Deserialize, Serialize};

/// Per-open-file state as handlers see it.
///
/// Handlers may change any field; the change is written back to the host's
/// record when the call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandleInfo {
    /// Handle identifier chosen by the handler on open.
    pub handle: u64,
    /// Open-mode flags (`O_RDONLY`, `O_WRONLY`, ...).
    pub flags: u32,
    /// Bypass the page cache for this file.
    pub direct_io: bool,
    /// The file does not support seeking.
    pub nonseekable: bool,
}

/// Entry metadata as handlers see it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Size in bytes.
    pub size: u64,
    /// File type and permission bits (`S_IFDIR | 0o755`).
    pub mode: u32,
    /// Owner user ID.
    pub uid: u32,
    /// Owner group ID.
    pub gid: u32,
}

impl FileAttributes {
    /// Returns true if the type bits mark a directory.
    pub fn is_dir(&self) -> bool {
        (self.mode & libc::S_IFMT as u32) == libc::S_IFDIR as u32
    }

    /// Returns true if the type bits mark a regular file.
    pub fn is_file(&self) -> bool {
        (self.mode & libc::S_IFMT as u32) == libc::S_IFREG as u32
    }

    /// Permission bits without the type.
    pub fn perm(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// The host's per-open-file record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostFileInfo {
    /// File handle.
    pub fh: u64,
    /// Open flags as the host stores them.
    pub flags: i32,
    /// Direct I/O requested.
    pub direct_io: bool,
    /// Seeking unsupported.
    pub nonseekable: bool,
    /// Keep the page cache across opens. Not visible to handlers.
    pub keep_cache: bool,
}

/// The host's metadata record.
///
/// Times are whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStat {
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub size: i64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}
