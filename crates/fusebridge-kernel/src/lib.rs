//! Dispatch core for fusebridge.
//!
//! Lets an embedding application supply the logic behind a virtual
//! filesystem as a handful of plain handlers, while a host filesystem runtime
//! drives the operations. Key components:
//!
//! - [`Bridge`] - The five dispatch entry points (open, read, write,
//!   getattr, readdir)
//! - [`HandlerTable`] / [`FsHandler`] - Handler registration
//! - [`ListingSlot`] / [`DirListing`] - Directory listing ownership transfer
//! - [`BlockAllocator`] - Allocator listing handlers must build with
//! - [`Status`] / [`BridgeError`] - The return-code contract
//!
//! ## Design Decisions
//!
//! - **Registration before serving**: a `Bridge` takes its `HandlerTable` by
//!   value and never exposes it mutably, so handlers cannot change while
//!   operations are in flight.
//! - **Single-owner listings**: listing blocks are not `Clone`; a listing
//!   moves from the handler into the dispatcher, which releases every block
//!   once, including entries left unvisited after a filler rejection.
//! - **Defaults merged with override**: getattr builds a fresh host record
//!   from the defaults and the handler's answer, except on NotFound where the
//!   host record is left alone.
//! - **No filesystem semantics**: paths, permissions and storage belong to
//!   the handlers.

pub mod alloc;
pub mod dispatch;
mod error;
pub mod listing;
mod operation;
pub mod registry;
pub mod translate;
mod types;

pub use alloc::{AllocStats, Block, BlockAllocator, TrackingAllocator, ZeroAllocator};
pub use dispatch::{Bridge, Filler};
pub use error::{BridgeError, BridgeResult, Status};
pub use listing::{DirListing, ListingBuilder, ListingSlot};
pub use operation::Operation;
pub use registry::{FsHandler, HandlerTable};
pub use types::{FileAttributes, FileHandleInfo, HostFileInfo, HostStat};
