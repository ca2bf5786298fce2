use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamgrab::{
    DirectTransport, DownloadMode, HlsTransport, MediaType, NoopReporter, ProgressEvent,
    ProgressReporter, Provider, ReqwestClient, RunConfig, RunLedger, SeasonOverride,
    SharedProgressReporter, SiteCatalog, Transports, preflight, run_show,
};

// Emoji with fallback for terminals without Unicode support
static CLAPPER: Emoji<'_, '_> = Emoji("🎬 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "[>] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static HOURGLASS: Emoji<'_, '_> = Emoji("⏳ ", "[z] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static RETRY: Emoji<'_, '_> = Emoji("🔁 ", "[r] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Download whole seasons and movies of a show from a streaming catalog
#[derive(Parser, Debug)]
#[command(name = "streamgrab")]
#[command(about = "Download seasons and movies of a show from a streaming catalog")]
#[command(version)]
struct Args {
    /// Catalog to use: anime or serie
    #[arg(short = 't', long = "type", default_value = "anime")]
    media_type: MediaType,

    /// Show name as it appears in the catalog URL
    name: String,

    /// Preferred language label, e.g. "Deutsch" or "Ger-Sub"
    #[arg(short = 'l', long, default_value = "Deutsch")]
    language: String,

    /// Hosting provider: VOE, Streamtape or Vidoza
    #[arg(short, long, default_value = "VOE")]
    provider: Provider,

    /// What to download: series, movies or all
    #[arg(short, long, default_value = "series")]
    mode: DownloadMode,

    /// Season override: N for one season, N+ for N and later, 0 for all
    #[arg(short, long, default_value = "0")]
    season: SeasonOverride,

    /// Download a single episode of the selected season (0 downloads all)
    #[arg(short, long, default_value = "0")]
    episode: u32,

    /// Root folder for downloads
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Folder for the run ledger (defaults to the output folder)
    #[arg(long)]
    ledger_dir: Option<PathBuf>,

    /// Dispatches allowed before a cooldown
    #[arg(long, default_value = "5")]
    burst: usize,

    /// Cooldown in seconds after a full burst
    #[arg(long, default_value = "60")]
    cooldown: u64,

    /// Maximum number of running downloads checked after each cooldown
    #[arg(long, default_value = "5")]
    max_live: usize,

    /// Poll interval in seconds while waiting for running downloads
    #[arg(long, default_value = "30")]
    poll: u64,

    /// Only use the burst cooldown, never wait for running downloads
    #[arg(long)]
    no_live_cap: bool,

    /// Path to the media tool used for HLS streams
    #[arg(long)]
    remux_tool: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(self.media_type, self.name);
        config.language = self.language;
        config.provider = self.provider;
        config.mode = self.mode;
        config.season_override = self.season;
        config.episode_override = (self.episode > 0).then_some(self.episode);
        config.ledger_dir = self.ledger_dir.unwrap_or_else(|| self.output.clone());
        config.output_root = self.output;
        config.throttle.burst_limit = self.burst.max(1);
        config.throttle.cooldown = Duration::from_secs(self.cooldown);
        config.throttle.max_live_tasks = self.max_live;
        config.throttle.poll_interval = Duration::from_secs(self.poll);
        config.throttle.secondary_cap = !self.no_live_cap;
        config.remux_tool = self.remux_tool;
        config
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = match (verbose, quiet) {
        (true, _) => "streamgrab=debug",
        (false, true) => "streamgrab=warn",
        (false, false) => "streamgrab=info",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, download_id: usize) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(bar) = bars.get(&download_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(download_id, bar.clone());
        bar
    }

    fn finish_bar(&self, download_id: usize) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.remove(&download_id) {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ShowResolved {
                name,
                year,
                season_count,
            } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}{} ({}) • {} seasons",
                    name.bold().green(),
                    year.cyan(),
                    season_count.to_string().cyan()
                ));
            }

            ProgressEvent::GroupStarted { label, item_count } => {
                self.main_bar.set_message(format!(
                    "{FOLDER}{} • {} items",
                    label.bold(),
                    item_count.to_string().cyan()
                ));
            }

            ProgressEvent::ItemSkipped { title, reason } => {
                self.main_bar.set_message(format!(
                    "{} skipped: {}",
                    truncate_title(&title, 40).yellow(),
                    reason.dimmed()
                ));
            }

            ProgressEvent::Cooldown { duration } => {
                self.main_bar.set_message(format!(
                    "{HOURGLASS}Cooling down for {}s",
                    duration.as_secs().to_string().yellow()
                ));
            }

            ProgressEvent::WaitingForSlots { live, limit } => {
                self.main_bar.set_message(format!(
                    "{HOURGLASS}{} downloads running (limit {}), waiting",
                    live.to_string().yellow(),
                    limit
                ));
            }

            ProgressEvent::DownloadStarting {
                download_id,
                title,
                content_length,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(truncate_title(&title, 40));
            }

            ProgressEvent::DownloadProgress {
                download_id,
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                let bar = self.get_or_create_bar(download_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadRetrying {
                download_id,
                title,
                attempt,
                wait,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_position(0);
                bar.set_message(format!(
                    "{RETRY}{} attempt {} failed, retrying in {}s",
                    truncate_title(&title, 30).yellow(),
                    attempt,
                    wait.as_secs()
                ));
            }

            ProgressEvent::DownloadCompleted {
                download_id,
                title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_position(bytes_downloaded);
                bar.set_message(format!("{SUCCESS}{}", truncate_title(&title, 40).green()));
                self.finish_bar(download_id);
            }

            ProgressEvent::DownloadFailed {
                download_id,
                title,
                error,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.abandon_with_message(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&title, 30).red(),
                    error.red()
                ));
                self.finish_bar(download_id);
            }

            ProgressEvent::GroupFinished {
                label,
                succeeded,
                failed,
            } => {
                let _ = self.multi.println(format!(
                    "{FOLDER}{} finished: {} ok, {} failed",
                    label.bold(),
                    succeeded.to_string().green(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                ));
            }

            ProgressEvent::RunCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    let quiet = args.quiet;
    let config = args.into_config();

    if !quiet {
        println!(
            "\n{}{} {}\n",
            CLAPPER,
            "streamgrab".bold().magenta(),
            "- Catalog Downloader".dimmed()
        );
    }

    let tool = preflight(&config)
        .await
        .context("Startup checks failed")?;

    let client = ReqwestClient::new();
    let catalog = SiteCatalog::new(client.clone(), config.site_url());
    let transports = Transports {
        direct: Arc::new(DirectTransport::new(client.clone())),
        hls: Arc::new(HlsTransport::new(client, tool)),
    };
    let ledger = Arc::new(
        RunLedger::load(&config.ledger_dir).context("Failed to load the run ledger")?,
    );

    let reporter: SharedProgressReporter = if quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let result = run_show(&config, &catalog, transports, ledger.clone(), reporter)
        .await
        .with_context(|| format!("Failed to download {}", config.name))?;

    if !quiet && !result.failed_paths.is_empty() {
        println!("\n{}", "Failed downloads:".red().bold());
        for path in &result.failed_paths {
            println!("  {}{}", CROSS, path.display().to_string().yellow());
        }
    }

    if !quiet {
        println!(
            "\n{FOLDER}Output: {}\n{FOLDER}Ledger: {}\n",
            config.output_root.display().to_string().cyan(),
            ledger.path().display().to_string().dimmed()
        );
    }

    if result.failed > 0 && result.downloaded == 0 {
        std::process::exit(1);
    }

    Ok(())
}
