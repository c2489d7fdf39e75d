//! sharebox: mount an S3-compatible bucket as an encrypted, bidirectionally
//! synced local directory.
//!
//! Subcommands: `mount`, `unmount`, `status`, `stop`, `test`, `fix`.

mod context;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sbx_core::config::AppConfig;
use sbx_core::pidfile::{is_mounted, PidFile};

use context::AppContext;

#[derive(Parser, Debug)]
#[command(
    name = "sharebox",
    version,
    about = "Mount an S3-compatible bucket as an encrypted, synced local directory"
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short = 'c', default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mount the bucket at the configured (or overridden) mount point
    Mount {
        #[arg(long)]
        mount_point: Option<PathBuf>,
        /// Stay attached to the terminal instead of detaching
        #[arg(long)]
        foreground: bool,
    },
    /// Unmount a running mount
    Unmount {
        #[arg(long)]
        mount_point: Option<PathBuf>,
    },
    /// Report whether the daemon is running
    Status,
    /// Stop the running daemon
    Stop,
    /// Probe bucket connectivity and config validity without mounting
    Test,
    /// Force-unmount a stale FUSE mount left behind by a crashed process
    Fix,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;
    sbx_core::logging::init(&config.app.log_level, config.app.log_file.as_deref())
        .context("initializing logging")?;

    match cli.command {
        Commands::Mount {
            mount_point,
            foreground,
        } => cmd_mount(config, mount_point, foreground).await,
        Commands::Unmount { mount_point } => cmd_unmount(config, mount_point),
        Commands::Status => cmd_status(&config),
        Commands::Stop => cmd_stop(&config),
        Commands::Test => cmd_test(config).await,
        Commands::Fix => cmd_fix(config).await,
    }
}

async fn cmd_mount(
    mut config: AppConfig,
    mount_point_override: Option<PathBuf>,
    foreground: bool,
) -> Result<()> {
    if let Some(mp) = mount_point_override {
        config.sync.mount_point = mp;
    }
    let mount_point = config.sync.mount_point.clone();
    let cache_root = config.sync.local_cache_dir.clone();
    let pid_file_path = config.app.pid_file.clone();

    let ctx = AppContext::build(config).await?;
    if ctx.pid_file.is_running() {
        anyhow::bail!("sharebox is already running (pid file: {})", pid_file_path.display());
    }

    tokio::fs::create_dir_all(&mount_point)
        .await
        .with_context(|| format!("creating mount point: {}", mount_point.display()))?;

    ctx.engine
        .run_initial_sync()
        .await
        .context("initial sync failed")?;

    let _watcher = sbx_sync::watcher::start(&cache_root, ctx.engine.clone())
        .context("starting filesystem watcher")?;

    let worker_engine = ctx.engine.clone();
    let worker = tokio::spawn(async move { worker_engine.run_worker().await });

    ctx.pid_file.write_current().context("writing pid file")?;

    tracing::info!(
        mountpoint = %mount_point.display(),
        foreground,
        "sharebox starting"
    );

    let spec = sbx_core::types::MountSpec {
        mountpoint: mount_point.clone(),
        cache_root,
        foreground,
        allow_other: ctx.config.fuse.allow_other,
        allow_root: ctx.config.fuse.allow_root,
        default_permissions: ctx.config.fuse.default_permissions,
    };

    let mount_result = sbx_fuse::mount(sbx_fuse::MountConfig {
        spec,
        engine: ctx.engine.clone(),
    })
    .await;

    ctx.engine.shutdown();
    worker.abort();
    if let Err(e) = ctx.engine.flush_metadata() {
        tracing::warn!("flushing metadata on shutdown: {e}");
    }
    ctx.pid_file.remove();

    mount_result.context("FUSE mount failed")
}

fn cmd_unmount(config: AppConfig, mount_point_override: Option<PathBuf>) -> Result<()> {
    let mount_point = mount_point_override.unwrap_or(config.sync.mount_point);
    force_unmount(&mount_point)
}

fn cmd_status(config: &AppConfig) -> Result<()> {
    let pid_file = PidFile::new(&config.app.pid_file);
    if pid_file.is_running() {
        println!("ShareBox Status: Running");
    } else {
        println!("ShareBox Status: Stopped");
    }
    Ok(())
}

fn cmd_stop(config: &AppConfig) -> Result<()> {
    let pid_file = PidFile::new(&config.app.pid_file);
    if pid_file.send_stop_signal()? {
        println!("Stop signal sent.");
    } else {
        println!("ShareBox is not running.");
    }
    Ok(())
}

async fn cmd_test(config: AppConfig) -> Result<()> {
    config.validate().context("config validation failed")?;
    let op = sbx_store::build_from_r2_config(&config.r2).context("building storage operator")?;
    let store = sbx_store::ObjectStore::connect(op)
        .await
        .context("connecting to object store")?;
    sbx_store::check_health(&store)
        .await
        .context("storage health check failed")?;
    println!("OK: config valid, bucket reachable.");
    Ok(())
}

async fn cmd_fix(config: AppConfig) -> Result<()> {
    let mount_point = config.sync.mount_point.clone();

    if !is_mounted(&mount_point) {
        println!("{} is not mounted; nothing to fix.", mount_point.display());
        return Ok(());
    }

    let responsive = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        tokio::fs::read_dir(&mount_point),
    )
    .await
    .is_ok();

    if responsive {
        println!("{} is mounted and responsive.", mount_point.display());
        return Ok(());
    }

    println!(
        "{} is mounted but unresponsive; forcing unmount...",
        mount_point.display()
    );
    force_unmount(&mount_point)?;
    println!("Unmounted stale mount at {}.", mount_point.display());
    Ok(())
}

fn force_unmount(mount_point: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        let status = std::process::Command::new("umount").arg(mount_point).status();
        return match status {
            Ok(s) if s.success() => {
                println!("Unmounted: {}", mount_point.display());
                Ok(())
            }
            Ok(s) => anyhow::bail!("umount exited {s}"),
            Err(e) => anyhow::bail!("failed to run umount: {e}"),
        };
    }

    #[cfg(not(target_os = "macos"))]
    {
        let status = std::process::Command::new("fusermount3")
            .args(["-u", &mount_point.to_string_lossy()])
            .status();
        match status {
            Ok(s) if s.success() => {
                println!("Unmounted: {}", mount_point.display());
                Ok(())
            }
            _ => {
                let fallback = std::process::Command::new("umount").arg(mount_point).status();
                match fallback {
                    Ok(f) if f.success() => {
                        println!("Unmounted: {}", mount_point.display());
                        Ok(())
                    }
                    _ => anyhow::bail!(
                        "failed to unmount {}: try `fusermount3 -u {}` manually",
                        mount_point.display(),
                        mount_point.display()
                    ),
                }
            }
        }
    }
}
