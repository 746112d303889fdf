//! `hangar` command line: parses arguments into option records and runs one operation

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hangar::operations::{self, DEFAULT_LANG_CODE, PrefixSettings, ServerSetup};
use hangar::progress::IntoProgressCallback;
use hangar::{
    BatchReport, Context, DownloadOptions, DownloadType, HangarConfig, HangarError, InstallOptions, OperatingSystem,
    ReleaseSelector, RunOptions, TracingProgressReporter, UninstallOptions, ValidateOptions,
};

#[derive(Parser)]
#[command(name = "hangar", version, about = "Install, validate, run and remove catalog products")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true, help = "Debug logging and external tool output")]
    verbose: bool,

    #[arg(long, global = true, help = "Also write logs to a daily file in the logs directory")]
    debug_log: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Expand packs into the games they include")]
    Resolve {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Download, validate and install products")]
    Install {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long = "os", help = "Target operating system, the host when omitted")]
        operating_system: Option<OperatingSystem>,
        #[arg(long, default_value = DEFAULT_LANG_CODE)]
        lang_code: String,
        #[arg(long = "download-type", help = "installer, dlc or extra; installer and dlc when omitted")]
        download_types: Vec<DownloadType>,
        #[arg(long)]
        keep_downloads: bool,
        #[arg(long)]
        no_steam_shortcut: bool,
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Remove installed products (requires --force)")]
    Uninstall {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long = "os")]
        operating_system: Option<OperatingSystem>,
        #[arg(long, default_value = DEFAULT_LANG_CODE)]
        lang_code: String,
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Launch an installed game")]
    Run {
        id: String,
        #[arg(long = "os")]
        operating_system: Option<OperatingSystem>,
        #[arg(long)]
        lang_code: Option<String>,
        #[arg(long, help = "Play task name from the game info file")]
        play_task: Option<String>,
        #[arg(long, help = "Skip game info and use the platform launcher")]
        default_launcher: bool,
        #[arg(long = "env", help = "KEY=VALUE added to the environment")]
        env: Vec<String>,
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long)]
        work_dir: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Download product files")]
    Download(DownloadArgs),

    #[command(about = "Delete downloaded product files")]
    RemoveDownloads(DownloadArgs),

    #[command(about = "Check downloaded files against their checksums")]
    Validate {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long = "os")]
        operating_systems: Vec<OperatingSystem>,
        #[arg(long = "lang-code")]
        lang_codes: Vec<String>,
        #[arg(long = "download-type")]
        download_types: Vec<DownloadType>,
        #[arg(long, help = "Report mismatches without downloading again")]
        no_repair: bool,
    },

    #[command(about = "Add or refresh Steam shortcuts of installed products")]
    AddSteamShortcut {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        lang_code: Option<String>,
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Remove Steam shortcuts of products")]
    RemoveSteamShortcut {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    #[command(about = "Download and unpack compatibility runtime releases")]
    CacheReleases {
        #[arg(long = "os")]
        operating_system: Option<OperatingSystem>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, help = "Every release instead of the newest")]
        all: bool,
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Remove every cached release but the newest")]
    CleanupReleases {
        #[arg(long = "os")]
        operating_system: Option<OperatingSystem>,
    },

    #[command(about = "List installed products")]
    ListInstalled {
        #[arg(long = "os")]
        operating_system: Option<OperatingSystem>,
        #[arg(long, default_value = DEFAULT_LANG_CODE)]
        lang_code: String,
    },

    #[command(about = "Pin executable, environment and arguments of a compatibility prefix")]
    PinPrefixSettings {
        id: String,
        #[arg(long, default_value = DEFAULT_LANG_CODE)]
        lang_code: String,
        #[arg(long, help = "Executable relative to the prefix")]
        exe: Option<String>,
        #[arg(long = "env")]
        env: Vec<String>,
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long)]
        reset: bool,
    },

    #[command(about = "Store the catalog server connection")]
    SetupServer {
        #[arg(long)]
        protocol: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        reset: bool,
        #[arg(long)]
        test: bool,
    },

    #[command(about = "Check the stored server connection")]
    TestServer,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(required = true)]
    ids: Vec<String>,
    #[arg(long = "os")]
    operating_systems: Vec<OperatingSystem>,
    #[arg(long = "lang-code")]
    lang_codes: Vec<String>,
    #[arg(long = "download-type")]
    download_types: Vec<DownloadType>,
    #[arg(long = "manual-url")]
    manual_urls: Vec<String>,
    #[arg(long)]
    force: bool,
}

impl From<DownloadArgs> for DownloadOptions {
    fn from(args: DownloadArgs) -> Self {
        DownloadOptions {
            ids: args.ids,
            operating_systems: args.operating_systems,
            lang_codes: args.lang_codes,
            download_types: args.download_types,
            manual_urls: args.manual_urls,
            force: args.force,
        }
    }
}

/// Console logging, plus a daily file when `debug_log`; the guard flushes the file on drop
fn init_logging(verbose: bool, debug_log: bool, logs_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let (file_layer, guard) = if debug_log {
        std::fs::create_dir_all(logs_dir).with_context(|| format!("creating {}", logs_dir.display()))?;
        let appender = tracing_appender::rolling::daily(logs_dir, "hangar.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("installing the log subscriber")?;
    Ok(guard)
}

fn finish(operation: &str, report: BatchReport) -> Result<()> {
    info!(
        "{}: {} succeeded, {} skipped, {} failed",
        operation,
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.is_success() {
        for (id, message) in &report.failed {
            error!("{}: {}", id, message);
        }
        bail!("{} failed for {} product(s)", operation, report.failed.len());
    }
    Ok(())
}

async fn execute(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Resolve { ids, force } => {
            let resolved = operations::resolve_catalog(ctx, &ids, force).await?;
            for id in &resolved.games {
                println!("{}", id);
            }
            if !resolved.skipped_dlcs.is_empty() {
                info!("Skipped DLCs: {}", resolved.skipped_dlcs.join(", "));
            }
            Ok(())
        }
        Command::Install {
            ids,
            operating_system,
            lang_code,
            download_types,
            keep_downloads,
            no_steam_shortcut,
            force,
        } => {
            let mut options = InstallOptions::new(ids, lang_code)
                .keep_downloads(keep_downloads)
                .no_steam_shortcut(no_steam_shortcut)
                .force(force);
            options.operating_system = operating_system;
            if !download_types.is_empty() {
                options = options.download_types(&download_types);
            }
            finish("install", operations::install(ctx, &options).await?)
        }
        Command::Uninstall {
            ids,
            operating_system,
            lang_code,
            force,
        } => {
            let mut options = UninstallOptions::new(ids, lang_code).force(force);
            options.operating_system = operating_system;
            finish("uninstall", operations::uninstall(ctx, &options).await?)
        }
        Command::Run {
            id,
            operating_system,
            lang_code,
            play_task,
            default_launcher,
            env,
            args,
            work_dir,
            force,
        } => {
            let mut options = RunOptions::new(id);
            options.operating_system = operating_system;
            options.lang_code = lang_code;
            options.force = force;
            options.request.play_task = play_task;
            options.request.default_launcher = default_launcher;
            options.request.env = env;
            options.request.args = args;
            options.request.work_dir = work_dir;
            operations::run(ctx, &options).await?;
            Ok(())
        }
        Command::Download(args) => finish("download", operations::download(ctx, &args.into()).await?),
        Command::RemoveDownloads(args) => {
            finish("remove-downloads", operations::remove_downloads(ctx, &args.into()).await?)
        }
        Command::Validate {
            ids,
            operating_systems,
            lang_codes,
            download_types,
            no_repair,
        } => {
            let options = ValidateOptions {
                ids,
                operating_systems,
                lang_codes,
                download_types,
                repair: !no_repair,
            };
            finish("validate", operations::validate(ctx, &options).await?)
        }
        Command::AddSteamShortcut { ids, lang_code, force } => finish(
            "add-steam-shortcut",
            operations::sync_shortcuts(ctx, &ids, lang_code.as_deref(), force).await?,
        ),
        Command::RemoveSteamShortcut { ids } => {
            finish("remove-steam-shortcut", operations::remove_shortcuts(ctx, &ids).await?)
        }
        Command::CacheReleases {
            operating_system,
            owner,
            repo,
            tags,
            all,
            force,
        } => {
            let mut selector = ReleaseSelector::new().tags(tags).all(all);
            if let Some(owner) = owner {
                selector = selector.owner(owner);
            }
            if let Some(repo) = repo {
                selector = selector.repo(repo);
            }
            let cached = operations::cache_releases(ctx, operating_system, &selector, force).await?;
            for path in cached {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::CleanupReleases { operating_system } => {
            let removed = operations::cleanup_releases(ctx, operating_system).await?;
            info!("Removed {} stale release item(s)", removed);
            Ok(())
        }
        Command::ListInstalled {
            operating_system,
            lang_code,
        } => {
            for summary in operations::list_installed(ctx, operating_system, &lang_code)? {
                println!("{}\t{}\t{}", summary.name, summary.version, summary.size);
            }
            Ok(())
        }
        Command::PinPrefixSettings {
            id,
            lang_code,
            exe,
            env,
            args,
            reset,
        } => {
            let settings = PrefixSettings { exe, env, args, reset };
            let key = operations::pin_prefix_settings(ctx, &id, &lang_code, &settings).await?;
            info!("Pinned prefix settings of {}", key);
            Ok(())
        }
        Command::SetupServer {
            protocol,
            address,
            port,
            username,
            password,
            reset,
            test,
        } => {
            let setup = ServerSetup {
                protocol,
                address,
                port,
                username,
                password,
                reset,
                test,
            };
            operations::setup_server(ctx, &setup).await?;
            Ok(())
        }
        Command::TestServer => {
            operations::test_server_connection(ctx).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HangarConfig::from_env();
    config.verbose = cli.verbose;
    let _guard = init_logging(cli.verbose, cli.debug_log, &config.paths().logs)?;

    let ctx = Context::builder(config)
        .progress(TracingProgressReporter::new(cli.verbose).into_callback())
        .build()?;

    match execute(&ctx, cli.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(hangar_error) = e.downcast_ref::<HangarError>() {
                error!("{}", hangar_error.detailed_report());
            }
            Err(e)
        }
    }
}
