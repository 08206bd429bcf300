//! fuser adapter.
//!
//! [`FuseHost`] implements [`fuser::Filesystem`] on top of a [`Bridge`]. It
//! keeps the inode table, turns kernel requests into path-based dispatch
//! calls and turns dispatch statuses back into replies.
//!
//! The kernel pages directory listings by offset while a handler produces
//! the whole listing at once, so every `readdir` request collects the full
//! listing and replies with the slice past the requested offset.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use fusebridge_kernel::{Bridge, BridgeError, BridgeResult, Filler, HostFileInfo, HostStat};
use libc::c_int;
use tracing::{debug, info, warn};

use crate::config::MountConfig;
use crate::inode::{InodeTable, child_path, parent_path};

/// Open reply flags understood by the kernel.
pub const FOPEN_DIRECT_IO: u32 = 1 << 0;
pub const FOPEN_KEEP_CACHE: u32 = 1 << 1;
pub const FOPEN_NONSEEKABLE: u32 = 1 << 2;

const S_IFMT: u32 = libc::S_IFMT as u32;
const S_IFDIR: u32 = libc::S_IFDIR as u32;
const S_IFLNK: u32 = libc::S_IFLNK as u32;
const S_IFCHR: u32 = libc::S_IFCHR as u32;
const S_IFBLK: u32 = libc::S_IFBLK as u32;
const S_IFIFO: u32 = libc::S_IFIFO as u32;
const S_IFSOCK: u32 = libc::S_IFSOCK as u32;

/// Filler that buffers a listing, rejecting entries past `limit`.
#[derive(Debug)]
pub struct CollectingFiller {
    names: Vec<Vec<u8>>,
    limit: usize,
}

impl CollectingFiller {
    pub fn new(limit: usize) -> Self {
        Self {
            names: Vec::new(),
            limit,
        }
    }

    pub fn into_names(self) -> Vec<Vec<u8>> {
        self.names
    }
}

impl Filler for CollectingFiller {
    fn fill(&mut self, name: &[u8]) -> bool {
        if self.names.len() >= self.limit {
            return false;
        }
        self.names.push(name.to_vec());
        true
    }
}

/// One directory entry as replied to the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub kind: FileType,
    pub name: String,
}

pub struct FuseHost {
    bridge: Arc<Bridge>,
    inodes: InodeTable,
    ttl: Duration,
    max_listing_entries: usize,
}

impl FuseHost {
    pub fn new(bridge: Arc<Bridge>, config: &MountConfig) -> Self {
        Self {
            bridge,
            inodes: InodeTable::new(),
            ttl: config.attr_ttl(),
            max_listing_entries: config.max_listing_entries,
        }
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// Attributes for `path`, reported under inode `ino`.
    pub fn stat_path(&self, path: &str, ino: u64) -> BridgeResult<FileAttr> {
        let mut st = HostStat {
            ino,
            ..Default::default()
        };
        self.bridge.getattr(path, &mut st).into_result()?;
        Ok(to_file_attr(&st))
    }

    /// Resolve `name` inside directory `parent`, assigning an inode on success.
    ///
    /// Handlers only see UTF-8 paths, so other names never resolve.
    pub fn lookup_path(&self, parent: u64, name: &OsStr) -> BridgeResult<FileAttr> {
        let parent = self.path_of(parent)?;
        let name = name.to_str().ok_or(BridgeError::NotFound)?;
        let path = child_path(&parent, name);

        let mut attr = self.stat_path(&path, 0)?;
        attr.ino = self.inodes.get_or_insert(&path);
        Ok(attr)
    }

    /// The full listing of the directory at inode `ino`.
    ///
    /// Names that are not UTF-8 could never be looked up, so they are
    /// dropped from the listing.
    pub fn list(&self, ino: u64) -> BridgeResult<Vec<DirEntry>> {
        let path = self.path_of(ino)?;
        let mut filler = CollectingFiller::new(self.max_listing_entries);
        self.bridge.readdir(&path, &mut filler, 0, None).into_result()?;

        let entries = filler
            .into_names()
            .into_iter()
            .filter_map(|name| match String::from_utf8(name) {
                Ok(name) => Some(self.dir_entry(&path, ino, name)),
                Err(e) => {
                    warn!(dir = %path, name = ?e.as_bytes(), "skipping non-UTF-8 entry");
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    fn dir_entry(&self, dir: &str, dir_ino: u64, name: String) -> DirEntry {
        match name.as_str() {
            "." => DirEntry {
                ino: dir_ino,
                kind: FileType::Directory,
                name,
            },
            ".." => DirEntry {
                ino: self.inodes.get_or_insert(parent_path(dir)),
                kind: FileType::Directory,
                name,
            },
            _ => {
                let path = child_path(dir, &name);
                let ino = self.inodes.get_or_insert(&path);
                let kind = self
                    .stat_path(&path, ino)
                    .map(|attr| attr.kind)
                    .unwrap_or(FileType::RegularFile);
                DirEntry { ino, kind, name }
            }
        }
    }

    fn path_of(&self, ino: u64) -> BridgeResult<String> {
        self.inodes.path(ino).ok_or(BridgeError::NotFound)
    }
}

impl Filesystem for FuseHost {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(
            registered = ?self.bridge.handlers().registered(),
            "fuse session started"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        info!(inodes = self.inodes.len(), "fuse session ended");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_path(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => {
                debug!(parent, ?name, error = %e, "lookup failed");
                reply.error(e.errno())
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let result = self
            .path_of(ino)
            .and_then(|path| self.stat_path(&path, ino));
        match result {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => {
                debug!(ino, error = %e, "getattr failed");
                reply.error(e.errno())
            }
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e.errno()),
        };

        let mut fi = HostFileInfo {
            flags,
            ..Default::default()
        };
        match self.bridge.open(&path, &mut fi).into_result() {
            Ok(_) => reply.opened(fi.fh, open_reply_flags(&fi)),
            Err(e) => {
                debug!(path, flags, error = %e, "open failed");
                reply.error(e.errno())
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e.errno()),
        };
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(libc::EINVAL);
        };

        let mut fi = HostFileInfo {
            fh,
            flags,
            ..Default::default()
        };
        let mut buf = vec![0u8; size as usize];
        match self.bridge.read(&path, &mut buf, offset, &mut fi).into_result() {
            Ok(n) => reply.data(&buf[..(n as usize).min(buf.len())]),
            Err(e) => {
                debug!(path, offset, error = %e, "read failed");
                reply.error(e.errno())
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e.errno()),
        };
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(libc::EINVAL);
        };

        let mut fi = HostFileInfo {
            fh,
            flags,
            ..Default::default()
        };
        match self.bridge.write(&path, data, offset, &mut fi).into_result() {
            Ok(n) => reply.written(n),
            Err(e) => {
                debug!(path, offset, error = %e, "write failed");
                reply.error(e.errno())
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.list(ino) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(ino, error = %e, "readdir failed");
                return reply.error(e.errno());
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (idx, entry) in entries.iter().enumerate().skip(skip) {
            let next = (idx + 1) as i64;
            // add() returns true once the reply buffer is full
            if reply.add(entry.ino, next, entry.kind, &entry.name) {
                debug!(ino, offset, next, "readdir: reply buffer full");
                break;
            }
        }
        reply.ok();
    }
}

/// Kind of file encoded in a mode word.
pub fn file_type(mode: u32) -> FileType {
    match mode & S_IFMT {
        S_IFDIR => FileType::Directory,
        S_IFLNK => FileType::Symlink,
        S_IFCHR => FileType::CharDevice,
        S_IFBLK => FileType::BlockDevice,
        S_IFIFO => FileType::NamedPipe,
        S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

fn system_time(secs: i64) -> SystemTime {
    match u64::try_from(secs) {
        Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs),
        Err(_) => {
            warn!(secs, "timestamp before epoch, clamping");
            UNIX_EPOCH
        }
    }
}

pub fn to_file_attr(st: &HostStat) -> FileAttr {
    let mtime = system_time(st.mtime);
    FileAttr {
        ino: st.ino,
        size: u64::try_from(st.size).unwrap_or(0),
        blocks: st.blocks,
        atime: system_time(st.atime),
        mtime,
        ctime: system_time(st.ctime),
        crtime: mtime,
        kind: file_type(st.mode),
        perm: (st.mode & 0o7777) as u16,
        nlink: st.nlink,
        uid: st.uid,
        gid: st.gid,
        rdev: st.rdev,
        blksize: st.blksize,
        flags: 0,
    }
}

pub fn open_reply_flags(fi: &HostFileInfo) -> u32 {
    let mut flags = 0;
    if fi.direct_io {
        flags |= FOPEN_DIRECT_IO;
    }
    if fi.keep_cache {
        flags |= FOPEN_KEEP_CACHE;
    }
    if fi.nonseekable {
        flags |= FOPEN_NONSEEKABLE;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusebridge_kernel::{HandlerTable, Status};

    fn host(handlers: HandlerTable, max_listing_entries: usize) -> FuseHost {
        let config = MountConfig {
            max_listing_entries,
            ..Default::default()
        };
        FuseHost::new(Arc::new(Bridge::new(handlers)), &config)
    }

    fn tree() -> HandlerTable {
        HandlerTable::new()
            .with_getattr(|path, attrs| match path {
                "/" | "/d" => {
                    attrs.mode = libc::S_IFDIR as u32 | 0o755;
                    Status::OK
                }
                "/f" => {
                    attrs.mode = libc::S_IFREG as u32 | 0o644;
                    attrs.size = 3;
                    Status::OK
                }
                _ => Status::NOT_FOUND,
            })
            .with_readdir(|path, slot| {
                if path == "/" {
                    slot.fill([".", "..", "d", "f"]);
                }
                Status::OK
            })
    }

    #[test]
    fn test_file_type_from_mode() {
        assert_eq!(file_type(libc::S_IFDIR as u32 | 0o755), FileType::Directory);
        assert_eq!(file_type(libc::S_IFREG as u32 | 0o644), FileType::RegularFile);
        assert_eq!(file_type(libc::S_IFLNK as u32), FileType::Symlink);
        assert_eq!(file_type(0), FileType::RegularFile);
    }

    #[test]
    fn test_to_file_attr() {
        let st = HostStat {
            ino: 9,
            mode: libc::S_IFREG as u32 | 0o444,
            nlink: 1,
            size: 13,
            mtime: 100,
            ..Default::default()
        };
        let attr = to_file_attr(&st);
        assert_eq!(attr.ino, 9);
        assert_eq!(attr.size, 13);
        assert_eq!(attr.perm, 0o444);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.mtime, UNIX_EPOCH + Duration::from_secs(100));
    }

    #[test]
    fn test_negative_size_and_time_clamp() {
        let attr = to_file_attr(&HostStat {
            size: -1,
            atime: -5,
            ..Default::default()
        });
        assert_eq!(attr.size, 0);
        assert_eq!(attr.atime, UNIX_EPOCH);
    }

    #[test]
    fn test_open_reply_flags() {
        let fi = HostFileInfo {
            direct_io: true,
            nonseekable: true,
            ..Default::default()
        };
        assert_eq!(open_reply_flags(&fi), FOPEN_DIRECT_IO | FOPEN_NONSEEKABLE);
        assert_eq!(open_reply_flags(&HostFileInfo::default()), 0);
    }

    #[test]
    fn test_reply_errno_follows_error_class() {
        assert_eq!(Status::bytes(7).into_result(), Ok(7));
        assert_eq!(Status::NOT_FOUND.into_result().unwrap_err().errno(), libc::ENOENT);
        assert_eq!(Status::NOT_PERMITTED.into_result().unwrap_err().errno(), libc::EPERM);
        assert_eq!(Status::from_errno(libc::EROFS).into_result().unwrap_err().errno(), libc::EROFS);
    }

    #[test]
    fn test_collecting_filler_limit() {
        let mut filler = CollectingFiller::new(2);
        assert!(filler.fill(b"a"));
        assert!(filler.fill(b"b"));
        assert!(!filler.fill(b"c"));
        assert_eq!(filler.into_names(), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_lookup_assigns_inode() {
        let host = host(tree(), 16);
        let attr = host.lookup_path(1, OsStr::new("f")).unwrap();
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.size, 3);
        assert_eq!(host.inodes().inode("/f"), Some(attr.ino));
    }

    #[test]
    fn test_lookup_missing_does_not_assign() {
        let host = host(tree(), 16);
        assert_eq!(host.lookup_path(1, OsStr::new("nope")).unwrap_err(), BridgeError::NotFound);
        assert!(host.inodes().inode("/nope").is_none());
    }

    #[test]
    fn test_lookup_unknown_parent() {
        let host = host(tree(), 16);
        assert_eq!(host.lookup_path(99, OsStr::new("f")).unwrap_err(), BridgeError::NotFound);
    }

    #[test]
    fn test_list_root() {
        let host = host(tree(), 16);
        let entries = host.list(1).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "d", "f"]);
        assert_eq!(entries[0].ino, 1);
        assert_eq!(entries[1].ino, 1);
        assert_eq!(entries[2].kind, FileType::Directory);
        assert_eq!(entries[3].kind, FileType::RegularFile);
    }

    #[test]
    fn test_list_without_listing_is_not_found() {
        let host = host(tree(), 16);
        let d = host.inodes().get_or_insert("/d");
        assert_eq!(host.list(d).unwrap_err(), BridgeError::NotFound);
    }

    #[test]
    fn test_list_over_limit_is_io_error() {
        let host = host(tree(), 3);
        assert_eq!(host.list(1).unwrap_err(), BridgeError::Io);
    }

    #[test]
    fn test_unregistered_getattr_is_eperm() {
        let host = host(HandlerTable::new(), 16);
        assert_eq!(host.stat_path("/", 1).unwrap_err().errno(), libc::EPERM);
    }

    #[test]
    fn test_list_skips_names_that_cannot_be_looked_up() {
        let handlers = HandlerTable::new()
            .with_getattr(|_, attrs| {
                attrs.mode = libc::S_IFREG as u32 | 0o644;
                Status::OK
            })
            .with_readdir(|_, slot| {
                slot.fill([&b"."[..], &b"ok"[..], &b"\xffbad"[..]]);
                Status::OK
            });
        let host = host(handlers, 16);

        let entries = host.list(1).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "ok"]);
        // A listed name resolves to the inode the listing reported.
        let ok = host.lookup_path(1, OsStr::new(&entries[1].name)).unwrap();
        assert_eq!(ok.ino, entries[1].ino);
        assert!(host.inodes().inode("/\u{fffd}bad").is_none());
    }
}
