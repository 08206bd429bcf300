//! Handler registration.
//!
//! A [`HandlerTable`] holds up to five optional handlers, one per
//! [`Operation`]. It is built once, then moved into a
//! [`Bridge`](crate::Bridge) which only ever reads it; there is no way to
//! add or remove a handler after serving starts.

use std::fmt;
use std::sync::Arc;

use crate::error::Status;
use crate::listing::ListingSlot;
use crate::operation::Operation;
use crate::types::{FileAttributes, FileHandleInfo};

/// `open(path, info)`.
pub type OpenFn = dyn Fn(&str, &mut FileHandleInfo) -> Status + Send + Sync;

/// `read(path, buf, offset, info)`. Returns the byte count or a negative code.
pub type ReadFn = dyn Fn(&str, &mut [u8], u64, &mut FileHandleInfo) -> Status + Send + Sync;

/// `write(path, data, offset, info)`. Returns the byte count or a negative code.
pub type WriteFn = dyn Fn(&str, &[u8], u64, &mut FileHandleInfo) -> Status + Send + Sync;

/// `getattr(path, attrs)`. `attrs` arrives holding the host defaults.
pub type GetAttrFn = dyn Fn(&str, &mut FileAttributes) -> Status + Send + Sync;

/// `readdir(path, slot)`. Leaving `slot` empty reports "not found".
pub type ReadDirFn = dyn Fn(&str, &mut ListingSlot<'_>) -> Status + Send + Sync;

/// A handler set expressed as one type.
///
/// [`HandlerTable::from_handler`] registers exactly the operations for which
/// [`FsHandler::supports`] returns true. Methods for unsupported operations
/// are never called, so their defaults do not matter.
pub trait FsHandler: Send + Sync + 'static {
    /// Whether this handler implements `op`.
    fn supports(&self, op: Operation) -> bool;

    fn open(&self, _path: &str, _info: &mut FileHandleInfo) -> Status {
        Status::NOT_PERMITTED
    }

    fn read(&self, _path: &str, _buf: &mut [u8], _offset: u64, _info: &mut FileHandleInfo) -> Status {
        Status::NOT_PERMITTED
    }

    fn write(&self, _path: &str, _data: &[u8], _offset: u64, _info: &mut FileHandleInfo) -> Status {
        Status::NOT_PERMITTED
    }

    fn getattr(&self, _path: &str, _attrs: &mut FileAttributes) -> Status {
        Status::NOT_PERMITTED
    }

    fn readdir(&self, _path: &str, _slot: &mut ListingSlot<'_>) -> Status {
        Status::NOT_PERMITTED
    }
}

/// Up to five optional handlers, one per operation.
#[derive(Clone, Default)]
pub struct HandlerTable {
    open: Option<Arc<OpenFn>>,
    read: Option<Arc<ReadFn>>,
    write: Option<Arc<WriteFn>>,
    getattr: Option<Arc<GetAttrFn>>,
    readdir: Option<Arc<ReadDirFn>>,
}

impl HandlerTable {
    /// A table with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the operations `handler` supports.
    pub fn from_handler<H: FsHandler>(handler: Arc<H>) -> Self {
        let mut table = Self::new();
        if handler.supports(Operation::Open) {
            let h = Arc::clone(&handler);
            table = table.with_open(move |path, info| h.open(path, info));
        }
        if handler.supports(Operation::Read) {
            let h = Arc::clone(&handler);
            table = table.with_read(move |path, buf, offset, info| h.read(path, buf, offset, info));
        }
        if handler.supports(Operation::Write) {
            let h = Arc::clone(&handler);
            table =
                table.with_write(move |path, data, offset, info| h.write(path, data, offset, info));
        }
        if handler.supports(Operation::GetAttr) {
            let h = Arc::clone(&handler);
            table = table.with_getattr(move |path, attrs| h.getattr(path, attrs));
        }
        if handler.supports(Operation::ReadDir) {
            let h = Arc::clone(&handler);
            table = table.with_readdir(move |path, slot| h.readdir(path, slot));
        }
        table
    }

    pub fn with_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut FileHandleInfo) -> Status + Send + Sync + 'static,
    {
        self.open = Some(Arc::new(f));
        self
    }

    pub fn with_read<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut [u8], u64, &mut FileHandleInfo) -> Status + Send + Sync + 'static,
    {
        self.read = Some(Arc::new(f));
        self
    }

    pub fn with_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &[u8], u64, &mut FileHandleInfo) -> Status + Send + Sync + 'static,
    {
        self.write = Some(Arc::new(f));
        self
    }

    pub fn with_getattr<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut FileAttributes) -> Status + Send + Sync + 'static,
    {
        self.getattr = Some(Arc::new(f));
        self
    }

    pub fn with_readdir<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut ListingSlot<'_>) -> Status + Send + Sync + 'static,
    {
        self.readdir = Some(Arc::new(f));
        self
    }

    /// Whether a handler is registered for `op`.
    pub fn is_registered(&self, op: Operation) -> bool {
        match op {
            Operation::Open => self.open.is_some(),
            Operation::Read => self.read.is_some(),
            Operation::Write => self.write.is_some(),
            Operation::GetAttr => self.getattr.is_some(),
            Operation::ReadDir => self.readdir.is_some(),
        }
    }

    /// Registered operations, in [`Operation::ALL`] order.
    pub fn registered(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.is_registered(*op))
            .collect()
    }

    pub(crate) fn open(&self) -> Option<&OpenFn> {
        self.open.as_deref()
    }

    pub(crate) fn read(&self) -> Option<&ReadFn> {
        self.read.as_deref()
    }

    pub(crate) fn write(&self) -> Option<&WriteFn> {
        self.write.as_deref()
    }

    pub(crate) fn getattr(&self) -> Option<&GetAttrFn> {
        self.getattr.as_deref()
    }

    pub(crate) fn readdir(&self) -> Option<&ReadDirFn> {
        self.readdir.as_deref()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StatOnly;

    impl FsHandler for StatOnly {
        fn supports(&self, op: Operation) -> bool {
            op == Operation::GetAttr
        }

        fn getattr(&self, _path: &str, attrs: &mut FileAttributes) -> Status {
            attrs.size = 1;
            Status::OK
        }
    }

    #[test]
    fn test_empty_table() {
        let table = HandlerTable::new();
        for op in Operation::ALL {
            assert!(!table.is_registered(op));
        }
        assert!(table.registered().is_empty());
    }

    #[test]
    fn test_builder_registers_individually() {
        let table = HandlerTable::new()
            .with_open(|_, _| Status::OK)
            .with_readdir(|_, _| Status::OK);
        assert_eq!(table.registered(), vec![Operation::Open, Operation::ReadDir]);
        assert!(table.open().is_some());
        assert!(table.read().is_none());
    }

    #[test]
    fn test_from_handler_respects_supports() {
        let table = HandlerTable::from_handler(Arc::new(StatOnly));
        assert_eq!(table.registered(), vec![Operation::GetAttr]);

        let mut attrs = FileAttributes::default();
        let getattr = table.getattr().unwrap();
        assert_eq!(getattr("/x", &mut attrs), Status::OK);
        assert_eq!(attrs.size, 1);
    }

    #[test]
    fn test_debug_lists_registered() {
        let table = HandlerTable::new().with_write(|_, data, _, _| Status::bytes(data.len()));
        assert_eq!(
            format!("{:?}", table),
            "HandlerTable { registered: [Write] }"
        );
    }
}
