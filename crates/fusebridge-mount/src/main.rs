//! fusebridge binary
//!
//! Mounts the bundled hello filesystem.
//!
//! ## Usage
//!
//! ```bash
//! fusebridge /mnt/hello
//! fusebridge /mnt/hello --auto-unmount --verbose
//! RUST_LOG=fusebridge_kernel=trace fusebridge /mnt/hello
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use fusebridge_kernel::HandlerTable;
use fusebridge_mount::HelloFs;

#[tokio::main]
async fn main() -> ExitCode {
    let handlers = HandlerTable::from_handler(Arc::new(HelloFs::new()));
    fusebridge_mount::run(std::env::args().collect(), handlers).await
}
