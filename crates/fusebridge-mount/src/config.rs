//! Mount configuration.
//!
//! Settings come from an optional RON file and are then overridden by
//! command-line flags. The file lives at `<config_dir>/fusebridge/mount.ron`
//! unless `--config` names another one:
//!
//! ```ron
//! (
//!     fs_name: "hello",
//!     auto_unmount: true,
//!     attr_ttl_secs: 5,
//! )
//! ```
//!
//! Missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fuser::MountOption;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_ATTR_TTL, DEFAULT_FS_NAME, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_LISTING_ENTRIES,
};
use crate::error::{MountError, MountResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Name shown in the mount table.
    pub fs_name: String,
    /// Let users other than the mounting one see the filesystem.
    pub allow_other: bool,
    /// Ask the kernel to unmount when the process exits.
    pub auto_unmount: bool,
    pub read_only: bool,
    /// Attribute and entry cache lifetime handed to the kernel.
    pub attr_ttl_secs: u64,
    /// Upper bound on entries buffered for one directory listing.
    pub max_listing_entries: usize,
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fs_name: DEFAULT_FS_NAME.to_string(),
            allow_other: false,
            auto_unmount: false,
            read_only: false,
            attr_ttl_secs: DEFAULT_ATTR_TTL.as_secs(),
            max_listing_entries: DEFAULT_MAX_LISTING_ENTRIES,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl MountConfig {
    /// `<config_dir>/fusebridge/mount.ron`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fusebridge").join(CONFIG_FILE_NAME))
    }

    /// Load the config.
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> MountResult<Self> {
        let path = match explicit {
            Some(path) => expand_path(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path)
            .map_err(|e| MountError::config_read(&path, e))?;
        let config = Self::from_ron_str(&text).map_err(|e| MountError::config_parse(&path, e))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Overlay command-line flags. Switches only ever turn options on.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(name) = &cli.fs_name {
            self.fs_name = name.clone();
        }
        if let Some(ttl) = cli.attr_ttl {
            self.attr_ttl_secs = ttl;
        }
        self.allow_other |= cli.allow_other;
        self.auto_unmount |= cli.auto_unmount;
        self.read_only |= cli.read_only;
        if cli.verbose {
            self.log_level = "debug".to_string();
        }
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_ttl_secs)
    }

    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![MountOption::FSName(self.fs_name.clone())];
        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        if self.auto_unmount {
            options.push(MountOption::AutoUnmount);
        }
        if self.read_only {
            options.push(MountOption::RO);
        }
        options
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}
