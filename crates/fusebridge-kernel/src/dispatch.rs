//! Host-facing dispatch entry points.
//!
//! Each dispatcher checks that a handler is registered, translates the host
//! record into the handler view, calls the handler, translates back, and
//! returns the handler's status. Unregistered operations fail with
//! [`Status::NOT_PERMITTED`] before any translation happens.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::alloc::{BlockAllocator, ZeroAllocator};
use crate::error::{BridgeError, Status};
use crate::listing::ListingSlot;
use crate::operation::Operation;
use crate::registry::HandlerTable;
use crate::translate::{load_attributes, load_file_info, unload_file_info};
use crate::types::{HostFileInfo, HostStat};

/// Host callback that accepts directory entries one at a time.
pub trait Filler {
    /// Offer one entry name. Returns false if the host rejects it.
    fn fill(&mut self, name: &[u8]) -> bool;
}

impl<F> Filler for F
where
    F: FnMut(&[u8]) -> bool,
{
    fn fill(&mut self, name: &[u8]) -> bool {
        self(name)
    }
}

/// The dispatch core: a fixed handler table plus the listing allocator.
///
/// Read-only after construction, so one `Bridge` can serve concurrent host
/// threads without locking.
pub struct Bridge {
    handlers: HandlerTable,
    allocator: Arc<dyn BlockAllocator>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Serve `handlers`, handing listing handlers a plain heap allocator.
    pub fn new(handlers: HandlerTable) -> Self {
        Self::with_allocator(handlers, Arc::new(ZeroAllocator))
    }

    /// Serve `handlers` with a caller-chosen listing allocator.
    pub fn with_allocator(handlers: HandlerTable, allocator: Arc<dyn BlockAllocator>) -> Self {
        debug!(registered = ?handlers.registered(), "bridge ready");
        Self {
            handlers,
            allocator,
        }
    }

    /// The registered handlers.
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn open(&self, path: &str, fi: &mut HostFileInfo) -> Status {
        let Some(handler) = self.handlers.open() else {
            return unregistered(Operation::Open, path);
        };

        let mut info = load_file_info(fi);
        let status = handler(path, &mut info);
        unload_file_info(&info, fi);

        debug!(path, %status, handle = info.handle, "open");
        status
    }

    /// Read into `buf`. The slice length is the requested byte count.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64, fi: &mut HostFileInfo) -> Status {
        let Some(handler) = self.handlers.read() else {
            return unregistered(Operation::Read, path);
        };

        let mut info = load_file_info(fi);
        let status = handler(path, buf, offset, &mut info);
        unload_file_info(&info, fi);

        debug!(path, offset, size = buf.len(), %status, "read");
        status
    }

    /// Write from `buf`. The slice length is the byte count.
    pub fn write(&self, path: &str, buf: &[u8], offset: u64, fi: &mut HostFileInfo) -> Status {
        let Some(handler) = self.handlers.write() else {
            return unregistered(Operation::Write, path);
        };

        let mut info = load_file_info(fi);
        let status = handler(path, buf, offset, &mut info);
        unload_file_info(&info, fi);

        debug!(path, offset, size = buf.len(), %status, "write");
        status
    }

    /// Fetch attributes into `st`, which arrives holding the host defaults.
    ///
    /// A NotFound status leaves `st` exactly as it was. Any other status,
    /// failures included, replaces `st` with the defaults merged with the
    /// handler's attributes and a link count of 1.
    pub fn getattr(&self, path: &str, st: &mut HostStat) -> Status {
        let Some(handler) = self.handlers.getattr() else {
            return unregistered(Operation::GetAttr, path);
        };

        let mut attrs = load_attributes(st);
        let status = handler(path, &mut attrs);

        if status == Status::NOT_FOUND {
            debug!(path, "getattr: not found");
        } else {
            *st = st.with_attributes(&attrs);
            debug!(path, %status, mode = attrs.mode, size = attrs.size, "getattr");
        }
        status
    }

    /// List a directory through `filler`.
    ///
    /// `offset` and `fi` are accepted for host compatibility and unused. A
    /// handler that leaves the slot empty gets [`Status::NOT_FOUND`]. A listing
    /// with zero entries is not absent: the filler is never called and the
    /// handler's status is returned. If the filler rejects an entry the result
    /// becomes [`Status::IO_ERROR`]; the rejected entry and every entry not yet
    /// offered are still released.
    pub fn readdir(
        &self,
        path: &str,
        filler: &mut dyn Filler,
        _offset: u64,
        _fi: Option<&HostFileInfo>,
    ) -> Status {
        let Some(handler) = self.handlers.readdir() else {
            return unregistered(Operation::ReadDir, path);
        };

        let allocator = self.allocator.as_ref();
        let mut slot = ListingSlot::new(allocator);
        let mut status = handler(path, &mut slot);

        let Some(listing) = slot.take() else {
            debug!(path, %status, "readdir: no listing");
            return Status::NOT_FOUND;
        };

        let (container, entries) = listing.into_parts();
        let total = entries.len();
        let mut entries = entries.into_iter();
        let mut offered = 0usize;

        for entry in entries.by_ref() {
            offered += 1;
            let accepted = filler.fill(entry.as_bytes());
            allocator.release(entry);
            if !accepted {
                warn!(path, offered, total, "readdir: filler rejected entry");
                status = Status::IO_ERROR;
                break;
            }
        }

        // Entries never offered still belong to us.
        for entry in entries {
            allocator.release(entry);
        }
        allocator.release(container);

        debug!(path, offered, total, %status, "readdir");
        status
    }
}

fn unregistered(op: Operation, path: &str) -> Status {
    let err = BridgeError::Unregistered(op);
    warn!(path, error = %err, "dispatch rejected");
    err.status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::TrackingAllocator;
    use crate::types::FileAttributes;

    fn tracked(handlers: HandlerTable) -> (Bridge, Arc<TrackingAllocator>) {
        let alloc = Arc::new(TrackingAllocator::new());
        let bridge = Bridge::with_allocator(handlers, alloc.clone());
        (bridge, alloc)
    }

    #[test]
    fn test_open_writes_back_handler_changes() {
        let bridge = Bridge::new(HandlerTable::new().with_open(|_, info| {
            info.handle = 77;
            info.direct_io = true;
            Status::OK
        }));
        let mut fi = HostFileInfo {
            flags: libc::O_RDONLY,
            keep_cache: true,
            ..Default::default()
        };
        assert_eq!(bridge.open("/f", &mut fi), Status::OK);
        assert_eq!(fi.fh, 77);
        assert!(fi.direct_io);
        assert!(fi.keep_cache);
    }

    #[test]
    fn test_open_status_passthrough() {
        let bridge = Bridge::new(
            HandlerTable::new().with_open(|_, _| Status::from_errno(libc::EROFS)),
        );
        let mut fi = HostFileInfo::default();
        assert_eq!(bridge.open("/f", &mut fi).raw(), -libc::EROFS);
    }

    #[test]
    fn test_read_handler_fills_host_buffer() {
        let bridge = Bridge::new(HandlerTable::new().with_read(|_, buf, offset, _| {
            let data = &b"hello world"[offset as usize..];
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            Status::bytes(n)
        }));
        let mut buf = [0u8; 5];
        let mut fi = HostFileInfo::default();
        assert_eq!(bridge.read("/f", &mut buf, 6, &mut fi), Status::bytes(5));
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_getattr_error_other_than_not_found_still_writes_back() {
        let bridge = Bridge::new(HandlerTable::new().with_getattr(|_, attrs| {
            attrs.uid = 500;
            Status::PERMISSION_DENIED
        }));
        let mut st = HostStat {
            nlink: 9,
            ..Default::default()
        };
        assert_eq!(bridge.getattr("/f", &mut st), Status::PERMISSION_DENIED);
        assert_eq!(st.uid, 500);
        assert_eq!(st.nlink, 1);
    }

    #[test]
    fn test_getattr_handler_sees_defaults() {
        let bridge = Bridge::new(HandlerTable::new().with_getattr(|_, attrs| {
            assert_eq!(
                *attrs,
                FileAttributes {
                    size: 10,
                    mode: 0o600,
                    uid: 1,
                    gid: 2
                }
            );
            Status::OK
        }));
        let mut st = HostStat {
            size: 10,
            mode: 0o600,
            uid: 1,
            gid: 2,
            ..Default::default()
        };
        assert_eq!(bridge.getattr("/f", &mut st), Status::OK);
    }

    #[test]
    fn test_readdir_filler_closure() {
        let (bridge, alloc) = tracked(HandlerTable::new().with_readdir(|_, slot| {
            slot.fill([".", ".."]);
            Status::OK
        }));
        let mut seen = Vec::new();
        let mut filler = |name: &[u8]| {
            seen.push(name.to_vec());
            true
        };
        assert_eq!(bridge.readdir("/", &mut filler, 0, None), Status::OK);
        assert_eq!(seen, vec![b".".to_vec(), b"..".to_vec()]);
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_readdir_keeps_handler_error_when_listing_present() {
        let (bridge, alloc) = tracked(HandlerTable::new().with_readdir(|_, slot| {
            slot.fill(["partial"]);
            Status::PERMISSION_DENIED
        }));
        let mut filler = |_: &[u8]| true;
        assert_eq!(
            bridge.readdir("/", &mut filler, 0, None),
            Status::PERMISSION_DENIED
        );
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_readdir_empty_slot_overrides_handler_status() {
        let bridge = Bridge::new(HandlerTable::new().with_readdir(|_, _| Status::OK));
        let mut calls = 0;
        let mut filler = |_: &[u8]| {
            calls += 1;
            true
        };
        assert_eq!(bridge.readdir("/", &mut filler, 0, None), Status::NOT_FOUND);
        assert_eq!(calls, 0);
    }
}
