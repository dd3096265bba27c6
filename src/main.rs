//! protect-archiver: download footage from a local UniFi Protect server.
//!
//! Usage:
//!   protect-archiver download ./out --username u --password p --start "2024-03-01 08:00:00" --end "2024-03-01 12:00:00"
//!   protect-archiver download ./out --snapshot
//!   protect-archiver events   ./out --start 2024-03-01 --end 2024-03-02 --download-motion-heatmaps
//!   protect-archiver sync     ./out --statefile sync.state
//!   protect-archiver cameras
//!
//! Every flag can also be set through a `PROTECT_*` environment variable or a
//! TOML file passed with `--config`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use protect_archiver::client::{select_cameras, ProtectClient};
use protect_archiver::config::Config;
use protect_archiver::error::Result;
use protect_archiver::footage::{download_footage, download_motion_event, download_snapshot};
use protect_archiver::planner::PlanOptions;
use protect_archiver::sync;

#[derive(Parser)]
#[command(name = "protect-archiver", about = "UniFi Protect footage downloader", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download footage (or snapshots) for a time range.
    Download(DownloadArgs),
    /// Download motion event clips for a time range.
    Events(EventsArgs),
    /// Download everything recorded since the last sync.
    Sync(SyncArgs),
    /// Print the cameras known to the console.
    Cameras(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Destination directory.
    dest: Option<PathBuf>,
    /// TOML configuration file; flags override its values.
    #[arg(short, long, env = "PROTECT_CONFIG")]
    config: Option<PathBuf>,
    /// IP address or hostname of the Protect server.
    #[arg(long, env = "PROTECT_ADDRESS")]
    address: Option<String>,
    /// Port of the Protect server (443 on UniFi OS, 7443 otherwise).
    #[arg(long, env = "PROTECT_PORT")]
    port: Option<u16>,
    /// The console does not run UniFi OS (bearer token auth).
    #[arg(long, env = "PROTECT_NOT_UNIFI_OS")]
    not_unifi_os: bool,
    #[arg(long, env = "PROTECT_USERNAME")]
    username: Option<String>,
    #[arg(long, env = "PROTECT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Verify the server TLS certificate.
    #[arg(long, env = "PROTECT_VERIFY_SSL")]
    verify_ssl: bool,
    /// Comma-separated camera IDs, or `all`.
    #[arg(long, env = "PROTECT_CAMERAS", default_value = "all")]
    cameras: String,
    /// Count failed downloads and continue with the next one.
    #[arg(long, env = "PROTECT_IGNORE_FAILED_DOWNLOADS")]
    ignore_failed_downloads: bool,
    /// Use UTC instead of local time in file names.
    #[arg(long, env = "PROTECT_USE_UTC")]
    use_utc_filenames: bool,
}

#[derive(Args)]
struct TransferArgs {
    /// Seconds to wait between downloads (also the retry delay, minimum 3).
    #[arg(long = "wait-between-downloads", env = "PROTECT_WAIT_BETWEEN_DOWNLOADS")]
    download_wait: Option<u64>,
    /// Seconds to wait for data before aborting a request.
    #[arg(long = "download-request-timeout", env = "PROTECT_DOWNLOAD_TIMEOUT")]
    download_timeout: Option<f64>,
    /// Skip files which already exist on disk.
    #[arg(long, env = "PROTECT_SKIP_EXISTING")]
    skip_existing_files: bool,
    /// Create an empty file before each download; combine with
    /// --skip-existing-files to step over problematic segments.
    #[arg(long, env = "PROTECT_TOUCH_FILES")]
    touch_files: bool,
    /// Store files in `YYYY/MM/DD/<camera>` subfolders (the default).
    #[arg(long, overrides_with = "no_use_subfolders")]
    use_subfolders: bool,
    /// Store all files directly in the destination directory.
    #[arg(long, env = "PROTECT_NO_USE_SUBFOLDERS", overrides_with = "use_subfolders")]
    no_use_subfolders: bool,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[command(flatten)]
    transfer: TransferArgs,
    /// Range start (`YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[+zzzz]`, `YYYY-MM-DDTHH:MM:SS`).
    #[arg(long, env = "PROTECT_START_TIME", value_parser = parse_time)]
    start: Option<DateTime<Local>>,
    /// Range end, same formats as --start.
    #[arg(long, env = "PROTECT_END_TIME", value_parser = parse_time)]
    end: Option<DateTime<Local>>,
    /// Let 1-hour segments float with --start (8:45, 9:45, …) instead of 8:45, 9:00, 10:00.
    #[arg(long, env = "PROTECT_DISABLE_ALIGNMENT")]
    disable_alignment: bool,
    /// Request the whole range at once. Exports longer than one hour can
    /// crash and restart the Protect console.
    #[arg(long, env = "PROTECT_DISABLE_SPLITTING")]
    disable_splitting: bool,
    /// Download a current snapshot of each camera instead of footage.
    #[arg(long = "snapshot", env = "PROTECT_CREATE_SNAPSHOT")]
    create_snapshot: bool,
}

#[derive(Args)]
struct EventsArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[command(flatten)]
    transfer: TransferArgs,
    #[arg(long, env = "PROTECT_START_TIME", value_parser = parse_time)]
    start: DateTime<Local>,
    #[arg(long, env = "PROTECT_END_TIME", value_parser = parse_time)]
    end: DateTime<Local>,
    /// Also download the motion heatmap of each event.
    #[arg(long, env = "PROTECT_DOWNLOAD_MOTION_HEATMAPS")]
    download_motion_heatmaps: bool,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// State file name inside the destination directory.
    #[arg(long, env = "PROTECT_SYNC_STATEFILE")]
    statefile: Option<String>,
    /// Ignore saved progress and start from each camera's first recording.
    #[arg(long, env = "PROTECT_SYNC_IGNORE_STATE")]
    ignore_state: bool,
}

/// What `download` should fetch, resolved before connecting.
enum DownloadMode {
    Footage { start: DateTime<Local>, end: DateTime<Local>, options: PlanOptions },
    Snapshot { at: DateTime<Utc> },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Download(args) => run_download(args).await,
        Command::Events(args) => run_events(args).await,
        Command::Sync(args) => run_sync(args).await,
        Command::Cameras(args) => run_cameras(args).await,
    };
    std::process::exit(code);
}

// ──────────────── argument handling ───────────────────────────────────────

fn parse_time(raw: &str) -> std::result::Result<DateTime<Local>, String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(ts.with_timezone(&Local));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("unrecognized time '{raw}'"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{raw}' does not exist in local time"))
}

fn base_config(common: &CommonArgs) -> anyhow::Result<Config> {
    let mut cfg = match &common.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(address) = &common.address {
        cfg.server.address = address.clone();
    }
    if common.port.is_some() {
        cfg.server.port = common.port;
    }
    if let Some(username) = &common.username {
        cfg.server.username = username.clone();
    }
    if common.password.is_some() {
        cfg.server.password = common.password.clone();
    }
    cfg.server.not_unifi_os |= common.not_unifi_os;
    cfg.server.verify_ssl |= common.verify_ssl;
    cfg.download.ignore_failed_downloads |= common.ignore_failed_downloads;
    cfg.download.use_utc_filenames |= common.use_utc_filenames;

    if let Some(dest) = &common.dest {
        cfg.download.destination_path = dest.clone();
    }
    let dest = &cfg.download.destination_path;
    if !dest.is_dir() {
        bail!("destination directory '{}' is invalid or does not exist", dest.display());
    }
    cfg.download.destination_path = dest
        .canonicalize()
        .with_context(|| format!("resolving {}", dest.display()))?;

    Ok(cfg)
}

fn apply_transfer(cfg: &mut Config, transfer: &TransferArgs) {
    if let Some(wait) = transfer.download_wait {
        cfg.download.download_wait_secs = wait;
    }
    if let Some(timeout) = transfer.download_timeout {
        cfg.download.download_timeout_secs = timeout;
    }
    cfg.download.skip_existing_files |= transfer.skip_existing_files;
    cfg.download.touch_files |= transfer.touch_files;
    if transfer.no_use_subfolders {
        cfg.download.use_subfolders = false;
    } else if transfer.use_subfolders {
        cfg.download.use_subfolders = true;
    }
}

fn connect(cfg: anyhow::Result<Config>) -> std::result::Result<ProtectClient, i32> {
    let cfg = cfg.map_err(|e| {
        error!(error = %format!("{e:#}"), "Invalid arguments");
        1
    })?;
    ProtectClient::new(cfg).map_err(|e| {
        error!(error = %e, "Failed to create client");
        e.exit_code()
    })
}

/// Print the summary line, then turn the outcome into an exit status.
fn finish(client: &ProtectClient, result: Result<()>) -> i32 {
    println!("{}", client.stats());
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, code = e.exit_code(), "Run aborted");
            e.exit_code()
        }
    }
}

// ──────────────── subcommands ─────────────────────────────────────────────

async fn run_download(args: DownloadArgs) -> i32 {
    let mode = if args.create_snapshot {
        if args.start.is_some() || args.end.is_some() {
            warn!("--start and --end are ignored when using --snapshot");
        }
        DownloadMode::Snapshot { at: Utc::now() }
    } else {
        match (args.start, args.end) {
            (Some(start), Some(end)) if start < end => DownloadMode::Footage {
                start,
                end,
                options: PlanOptions {
                    disable_alignment: args.disable_alignment,
                    disable_splitting: args.disable_splitting,
                },
            },
            (Some(_), Some(_)) => {
                error!("--start must be before --end");
                return 1;
            }
            _ => {
                error!("--start and --end are required unless --snapshot is given");
                return 1;
            }
        }
    };

    let cfg = base_config(&args.common).map(|mut cfg| {
        apply_transfer(&mut cfg, &args.transfer);
        cfg
    });
    let mut client = match connect(cfg) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = download(&mut client, &args.common.cameras, mode).await;
    finish(&client, result)
}

async fn download(client: &mut ProtectClient, selection: &str, mode: DownloadMode) -> Result<()> {
    let cameras = select_cameras(client.list_cameras().await?, selection);

    match mode {
        DownloadMode::Footage { start, end, options } => {
            for camera in &cameras {
                info!(camera = %camera.id, name = %camera.name, %start, %end,
                    "Downloading video files");
                download_footage(client, camera, start, end, options).await?;
            }
        }
        DownloadMode::Snapshot { at } => {
            info!(%at, cameras = cameras.len(), "Downloading snapshot files");
            for camera in &cameras {
                download_snapshot(client, camera, at).await?;
            }
        }
    }
    Ok(())
}

async fn run_events(args: EventsArgs) -> i32 {
    if args.start >= args.end {
        error!("--start must be before --end");
        return 1;
    }

    let cfg = base_config(&args.common).map(|mut cfg| {
        apply_transfer(&mut cfg, &args.transfer);
        cfg
    });
    let mut client = match connect(cfg) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = events(&mut client, &args).await;
    finish(&client, result)
}

async fn events(client: &mut ProtectClient, args: &EventsArgs) -> Result<()> {
    let start = args.start.with_timezone(&Utc);
    let end = args.end.with_timezone(&Utc);

    let all_cameras = client.list_cameras().await?;
    let motion_events = client.list_motion_events(start, end, &all_cameras).await?;
    let cameras = select_cameras(all_cameras, &args.common.cameras);

    info!(%start, %end, events = motion_events.len(), "Downloading motion event video files");
    for event in &motion_events {
        let Some(camera) = cameras.iter().find(|c| c.id == event.camera_id) else {
            info!(event = %event.id, start = %event.start, "Camera is not selected or not available, skipping event");
            continue;
        };
        download_motion_event(client, event, camera, args.download_motion_heatmaps).await?;
    }
    Ok(())
}

async fn run_sync(args: SyncArgs) -> i32 {
    let cfg = base_config(&args.common).map(|mut cfg| {
        // Sync always writes the YYYY/MM/DD/<camera> layout.
        cfg.download.use_subfolders = true;
        if let Some(statefile) = &args.statefile {
            cfg.sync.statefile = statefile.clone();
        }
        cfg.sync.ignore_state |= args.ignore_state;
        cfg
    });
    let mut client = match connect(cfg) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = async {
        let cameras = select_cameras(client.list_cameras().await?, &args.common.cameras);
        let ignore_state = client.config().sync.ignore_state;
        sync::run(&mut client, &cameras, ignore_state).await
    }
    .await;
    finish(&client, result)
}

async fn run_cameras(args: CommonArgs) -> i32 {
    let client = match connect(base_config(&args)) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match client.list_cameras().await {
        Ok(cameras) => {
            for cam in select_cameras(cameras, &args.cameras) {
                let since = cam
                    .recording_start
                    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{}\t{}\t{}", cam.id, cam.name, since);
            }
            0
        }
        Err(e) => {
            error!(error = %e, "Failed to list cameras");
            e.exit_code()
        }
    }
}
