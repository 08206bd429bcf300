//! Mount defaults.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Inode number of the mount root.
pub const ROOT_INODE: u64 = 1;

/// Filesystem name shown in the mount table.
pub const DEFAULT_FS_NAME: &str = "fusebridge";

/// How long the kernel may cache attributes and lookups.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Entries buffered per listing before the filler starts rejecting.
pub const DEFAULT_MAX_LISTING_ENTRIES: usize = 65_536;

/// Log level used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Config file name under the user config directory.
pub const CONFIG_FILE_NAME: &str = "mount.ron";
