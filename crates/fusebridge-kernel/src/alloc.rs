//! Allocator handed to listing handlers.
//!
//! Handlers allocate every block of a directory listing through a
//! [`BlockAllocator`] the bridge supplies; the bridge later releases each
//! block through that same allocator. A [`Block`] is not `Clone`, so each one
//! has exactly one owner at a time and can only be released once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

/// A zero-initialized, single-owner byte block.
pub struct Block {
    bytes: Box<[u8]>,
}

impl Block {
    /// Allocate `size` zeroed bytes on the global heap.
    pub fn zeroed(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("len", &self.len()).finish()
    }
}

/// Source of zeroed blocks for listing handlers.
pub trait BlockAllocator: Send + Sync {
    /// Allocate a zero-initialized block of `size` bytes.
    fn allocate(&self, size: usize) -> Block;

    /// Give a block back. Consumes it, so a block cannot be released twice.
    fn release(&self, block: Block);
}

/// Plain heap allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroAllocator;

impl BlockAllocator for ZeroAllocator {
    fn allocate(&self, size: usize) -> Block {
        Block::zeroed(size)
    }

    fn release(&self, block: Block) {
        drop(block);
    }
}

/// Counters reported by [`TrackingAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Blocks handed out.
    pub allocations: u64,
    /// Blocks given back.
    pub releases: u64,
    /// Bytes handed out and not yet given back.
    pub live_bytes: u64,
}

impl AllocStats {
    /// Blocks handed out and not yet given back.
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.releases)
    }
}

/// Heap allocator that counts what it hands out and gets back.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    allocations: AtomicU64,
    releases: AtomicU64,
    live_bytes: AtomicU64,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Acquire),
            releases: self.releases.load(Ordering::Acquire),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
        }
    }
}

impl BlockAllocator for TrackingAllocator {
    fn allocate(&self, size: usize) -> Block {
        self.allocations.fetch_add(1, Ordering::AcqRel);
        self.live_bytes.fetch_add(size as u64, Ordering::AcqRel);
        trace!(size, "block allocated");
        Block::zeroed(size)
    }

    fn release(&self, block: Block) {
        self.releases.fetch_add(1, Ordering::AcqRel);
        self.live_bytes
            .fetch_sub(block.len() as u64, Ordering::AcqRel);
        trace!(size = block.len(), "block released");
    }
}
