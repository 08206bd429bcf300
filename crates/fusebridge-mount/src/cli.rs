use std::path::PathBuf;

use clap::Parser;

/// Mount a fusebridge filesystem.
#[derive(Parser, Debug, Clone)]
#[command(name = "fusebridge")]
#[command(about = "Serve a handler set as a FUSE filesystem")]
pub struct Cli {
    /// Directory to mount on
    pub mountpoint: PathBuf,

    /// RON config file (default: <config_dir>/fusebridge/mount.ron)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Filesystem name shown in the mount table
    #[arg(long)]
    pub fs_name: Option<String>,

    /// Allow other users to access the mount
    #[arg(long)]
    pub allow_other: bool,

    /// Unmount automatically when the process exits
    #[arg(long)]
    pub auto_unmount: bool,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,

    /// Attribute cache lifetime in seconds
    #[arg(long, value_name = "SECS")]
    pub attr_ttl: Option<u64>,

    /// Log dispatch at debug level
    #[arg(short, long)]
    pub verbose: bool,
}
