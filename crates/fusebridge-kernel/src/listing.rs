//! Directory listings built by handlers and consumed by the bridge.
//!
//! A list-directory handler receives a [`ListingSlot`]. It builds a
//! [`DirListing`] through [`ListingSlot::builder`] (or the [`ListingSlot::fill`]
//! shortcut), which allocates the container and every entry from the
//! allocator the bridge put in the slot. Leaving the slot empty means "not
//! found". Once the handler returns, the listing moves into the dispatcher,
//! which releases each block exactly once before the call ends.

use std::mem;

use crate::alloc::{Block, BlockAllocator};

/// Bytes reserved in the container per entry.
const CONTAINER_SLOT: usize = mem::size_of::<usize>();

/// An ordered listing: one container block plus one block per entry name.
#[derive(Debug)]
pub struct DirListing {
    container: Block,
    entries: Vec<Block>,
}

impl DirListing {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names, in order.
    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(Block::as_bytes)
    }

    pub(crate) fn into_parts(self) -> (Block, Vec<Block>) {
        (self.container, self.entries)
    }

    /// Give every block back to `allocator`.
    pub(crate) fn release(self, allocator: &dyn BlockAllocator) {
        for entry in self.entries {
            allocator.release(entry);
        }
        allocator.release(self.container);
    }
}

/// Output slot and allocator handed to a list-directory handler.
pub struct ListingSlot<'a> {
    allocator: &'a dyn BlockAllocator,
    listing: Option<DirListing>,
}

impl<'a> ListingSlot<'a> {
    pub(crate) fn new(allocator: &'a dyn BlockAllocator) -> Self {
        Self {
            allocator,
            listing: None,
        }
    }

    /// The allocator every block of the listing must come from.
    pub fn allocator(&self) -> &'a dyn BlockAllocator {
        self.allocator
    }

    /// Start a listing backed by this slot's allocator.
    pub fn builder(&self) -> ListingBuilder<'a> {
        ListingBuilder {
            allocator: self.allocator,
            entries: Vec::new(),
        }
    }

    /// Build a listing from `names` and store it.
    pub fn fill<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut builder = self.builder();
        for name in names {
            builder.push(name);
        }
        self.set(builder.finish());
    }

    /// Store a finished listing. A listing stored earlier is released.
    pub fn set(&mut self, listing: DirListing) {
        if let Some(previous) = self.listing.replace(listing) {
            previous.release(self.allocator);
        }
    }

    /// Returns true once a listing has been stored.
    pub fn is_filled(&self) -> bool {
        self.listing.is_some()
    }

    pub(crate) fn take(&mut self) -> Option<DirListing> {
        self.listing.take()
    }
}

impl Drop for ListingSlot<'_> {
    fn drop(&mut self) {
        if let Some(listing) = self.listing.take() {
            listing.release(self.allocator);
        }
    }
}

/// Incremental listing construction.
///
/// Entries pushed but never finished are released on drop.
pub struct ListingBuilder<'a> {
    allocator: &'a dyn BlockAllocator,
    entries: Vec<Block>,
}

impl ListingBuilder<'_> {
    /// Append one entry name.
    pub fn push(&mut self, name: impl AsRef<[u8]>) -> &mut Self {
        let name = name.as_ref();
        let mut block = self.allocator.allocate(name.len());
        block.as_bytes_mut().copy_from_slice(name);
        self.entries.push(block);
        self
    }

    /// Entries pushed so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocate the container and seal the listing.
    pub fn finish(mut self) -> DirListing {
        let entries = mem::take(&mut self.entries);
        // One slot per entry plus the end marker.
        let container = self
            .allocator
            .allocate(CONTAINER_SLOT * (entries.len() + 1));
        DirListing { container, entries }
    }
}

impl Drop for ListingBuilder<'_> {
    fn drop(&mut self) {
        for entry in self.entries.drain(..) {
            self.allocator.release(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::TrackingAllocator;

    #[test]
    fn test_fill_allocates_entries_and_container() {
        let alloc = TrackingAllocator::new();
        let mut slot = ListingSlot::new(&alloc);
        assert!(!slot.is_filled());

        slot.fill(["a", "bb", "ccc"]);
        assert!(slot.is_filled());
        assert_eq!(alloc.stats().allocations, 4);

        let listing = slot.take().unwrap();
        let names: Vec<&[u8]> = listing.names().collect();
        assert_eq!(names, vec![&b"a"[..], &b"bb"[..], &b"ccc"[..]]);
        assert_eq!(listing.len(), 3);

        listing.release(&alloc);
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_empty_listing_still_has_container() {
        let alloc = TrackingAllocator::new();
        let mut slot = ListingSlot::new(&alloc);
        slot.fill(Vec::<String>::new());

        let listing = slot.take().unwrap();
        assert!(listing.is_empty());
        assert_eq!(alloc.stats().allocations, 1);
        listing.release(&alloc);
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_replacing_listing_releases_previous() {
        let alloc = TrackingAllocator::new();
        let mut slot = ListingSlot::new(&alloc);
        slot.fill(["old"]);
        slot.fill(["new"]);
        // Old entry and container are back.
        assert_eq!(alloc.stats().releases, 2);

        let listing = slot.take().unwrap();
        assert_eq!(listing.names().next(), Some(&b"new"[..]));
        listing.release(&alloc);
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_abandoned_builder_releases_entries() {
        let alloc = TrackingAllocator::new();
        let slot = ListingSlot::new(&alloc);
        {
            let mut builder = slot.builder();
            builder.push("x").push("y");
            assert_eq!(builder.len(), 2);
        }
        assert_eq!(alloc.stats().allocations, 2);
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_dropped_slot_releases_listing() {
        let alloc = TrackingAllocator::new();
        {
            let mut slot = ListingSlot::new(&alloc);
            slot.fill(["a", "b"]);
        }
        assert_eq!(alloc.stats().outstanding(), 0);
    }

    #[test]
    fn test_entries_are_exact_bytes() {
        let alloc = TrackingAllocator::new();
        let mut slot = ListingSlot::new(&alloc);
        slot.fill([&b"\xffraw"[..]]);
        assert_eq!(alloc.stats().live_bytes, 4 + (CONTAINER_SLOT * 2) as u64);
        let listing = slot.take().unwrap();
        assert_eq!(listing.names().next(), Some(&b"\xffraw"[..]));
        listing.release(&alloc);
    }
}
