//! Field copying between host records and handler records.
//!
//! Every conversion is total and copies verbatim: no validation, no
//! allocation, no failure.

use crate::types::{FileAttributes, FileHandleInfo, HostFileInfo, HostStat};

/// Host open-file record → handler view.
pub fn load_file_info(host: &HostFileInfo) -> FileHandleInfo {
    FileHandleInfo {
        handle: host.fh,
        flags: host.flags as u32,
        direct_io: host.direct_io,
        nonseekable: host.nonseekable,
    }
}

/// Handler view → host open-file record. Fields handlers never see are kept.
pub fn unload_file_info(info: &FileHandleInfo, host: &mut HostFileInfo) {
    host.fh = info.handle;
    host.flags = info.flags as i32;
    host.direct_io = info.direct_io;
    host.nonseekable = info.nonseekable;
}

/// Host metadata record → handler view.
pub fn load_attributes(host: &HostStat) -> FileAttributes {
    FileAttributes {
        size: host.size as u64,
        mode: host.mode,
        uid: host.uid,
        gid: host.gid,
    }
}

impl HostStat {
    /// Merge handler attributes over this record.
    ///
    /// Returns a fresh record: the four handler fields replaced, the link
    /// count forced to 1, everything else kept from `self`.
    pub fn with_attributes(&self, attrs: &FileAttributes) -> HostStat {
        HostStat {
            mode: attrs.mode,
            uid: attrs.uid,
            gid: attrs.gid,
            size: attrs.size as i64,
            nlink: 1,
            ..*self
        }
    }
}

impl From<&HostFileInfo> for FileHandleInfo {
    fn from(host: &HostFileInfo) -> Self {
        load_file_info(host)
    }
}

impl From<&HostStat> for FileAttributes {
    fn from(host: &HostStat) -> Self {
        load_attributes(host)
    }
}
