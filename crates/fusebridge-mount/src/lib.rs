//! Host runtime for fusebridge.
//!
//! Mounts a [`HandlerTable`] as a FUSE filesystem through `fuser`:
//!
//! - [`FuseHost`] - the `fuser::Filesystem` adapter over a [`Bridge`]
//! - [`MountConfig`] / [`Cli`] - RON config file plus command-line overrides
//! - [`run`] - process entry point: parse arguments, mount, serve until the
//!   session ends or a shutdown signal arrives, unmount
//! - [`HelloFs`] - demo handler set served by the `fusebridge` binary
//!
//! The session loop is single-threaded. Shutdown on SIGINT, SIGQUIT or
//! SIGTERM unmounts the filesystem, which ends the loop. If the mount is busy
//! a second signal detaches it lazily, and a third gives up.

pub mod cli;
pub mod config;
pub mod constants;
mod error;
pub mod hello;
pub mod host;
pub mod inode;

pub use cli::Cli;
pub use config::MountConfig;
pub use error::{MountError, MountResult};
pub use hello::HelloFs;
pub use host::FuseHost;
pub use inode::InodeTable;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fusebridge_kernel::{AllocStats, Bridge, HandlerTable, TrackingAllocator};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// An unmount helper: program and the arguments before the mountpoint.
type UnmountCommand = (&'static str, &'static [&'static str]);

/// Helpers tried on the first shutdown signal, in order.
const UNMOUNT_COMMANDS: &[UnmountCommand] = &[
    ("fusermount3", &["-u"]),
    ("fusermount", &["-u"]),
    ("umount", &[]),
];

/// Lazy detach, tried on the next signal if the mount was busy.
const LAZY_UNMOUNT_COMMANDS: &[UnmountCommand] = &[
    ("fusermount3", &["-uz"]),
    ("fusermount", &["-uz"]),
    ("umount", &["-l"]),
];

/// One round of helpers per shutdown signal.
const UNMOUNT_ROUNDS: &[&[UnmountCommand]] = &[UNMOUNT_COMMANDS, LAZY_UNMOUNT_COMMANDS];

/// Parse `argv`, mount `handlers` and serve until unmounted.
///
/// Returns success once the session ends cleanly, failure on bad arguments,
/// config errors or mount failures.
pub async fn run(argv: Vec<String>, handlers: HandlerTable) -> ExitCode {
    let cli = match Cli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    drop(argv);

    let mut config = match MountConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fusebridge: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.apply_cli(&cli);
    init_logging(&config.log_level);

    match serve(&cli.mountpoint, &config, handlers).await {
        Ok(stats) => {
            if stats.outstanding() > 0 {
                warn!(
                    outstanding = stats.outstanding(),
                    live_bytes = stats.live_bytes,
                    "listing blocks leaked"
                );
            }
            info!(
                allocations = stats.allocations,
                releases = stats.releases,
                "unmounted"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

async fn serve(
    mountpoint: &Path,
    config: &MountConfig,
    handlers: HandlerTable,
) -> anyhow::Result<AllocStats> {
    if !mountpoint.is_dir() {
        return Err(MountError::NotADirectory(mountpoint.to_path_buf()).into());
    }

    let mut shutdown =
        ShutdownSignals::install().context("failed to install signal handlers")?;

    let allocator = Arc::new(TrackingAllocator::new());
    let bridge = Arc::new(Bridge::with_allocator(handlers, allocator.clone()));
    let host = FuseHost::new(bridge, config);
    let options = config.mount_options();

    info!(
        mountpoint = %mountpoint.display(),
        fs_name = %config.fs_name,
        read_only = config.read_only,
        "mounting"
    );

    let (done, session) = oneshot::channel();
    let target = mountpoint.to_path_buf();
    // Not spawn_blocking: runtime shutdown waits for blocking tasks.
    std::thread::Builder::new()
        .name("fuse-session".into())
        .spawn(move || {
            let _ = done.send(fuser::mount2(host, &target, &options));
        })
        .map_err(|e| MountError::Session(e.to_string()))?;

    supervise(mountpoint, session, &mut shutdown, UNMOUNT_ROUNDS).await?;
    Ok(allocator.stats())
}

/// Wait for the session to end, unmounting on each shutdown signal.
///
/// Every signal runs the next round of helpers. A signal arriving after the
/// last round gives up on the mount and returns [`MountError::Unmount`], as
/// does a failure of the last round itself.
async fn supervise<S: ShutdownSource>(
    mountpoint: &Path,
    mut session: oneshot::Receiver<std::io::Result<()>>,
    shutdown: &mut S,
    rounds: &[&[UnmountCommand]],
) -> MountResult<()> {
    let mut round = 0;
    loop {
        tokio::select! {
            biased;
            result = &mut session => return finish(result),
            name = shutdown.recv() => {
                info!(signal = name, round, "shutting down");
                let Some(commands) = rounds.get(round) else {
                    error!(mountpoint = %mountpoint.display(), "giving up on unmount");
                    return Err(MountError::Unmount(mountpoint.to_path_buf()));
                };
                round += 1;
                match unmount(mountpoint, commands).await {
                    Ok(()) => {}
                    Err(e) if round >= rounds.len() => return Err(e),
                    Err(e) => warn!(error = %e, "mount busy, signal again to detach lazily"),
                }
            }
        }
    }
}

fn finish(result: Result<std::io::Result<()>, oneshot::error::RecvError>) -> MountResult<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(MountError::Mount(e)),
        Err(e) => Err(MountError::Session(e.to_string())),
    }
}

/// Try each helper until one succeeds.
async fn unmount(mountpoint: &Path, commands: &[UnmountCommand]) -> MountResult<()> {
    for &(program, args) in commands {
        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(mountpoint)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => {
                info!(program, ?args, "unmounted");
                return Ok(());
            }
            Ok(status) => warn!(program, %status, "unmount helper failed"),
            Err(e) => warn!(program, error = %e, "unmount helper unavailable"),
        }
    }
    Err(MountError::Unmount(mountpoint.to_path_buf()))
}

/// Source of shutdown requests.
trait ShutdownSource {
    /// Wait for the next request and name it.
    async fn recv(&mut self) -> &'static str;
}

struct ShutdownSignals {
    interrupt: Signal,
    quit: Signal,
    terminate: Signal,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }
}

impl ShutdownSource for ShutdownSignals {
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.quit.recv() => "SIGQUIT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}
