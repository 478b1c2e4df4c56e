//! CLI binary for pdf-harvest.
//!
//! A thin shim over the library crate: flags and `.env` values become a
//! `HarvestConfig`, subcommands map onto `Harvester` entry points.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_harvest::config::env;
use pdf_harvest::{
    Downloader, FetchReport, HarvestConfig, HarvestProgress, Harvester, HtmlLinkExtractor,
    NoopProgress, PdfiumRenderer, RegisterOutcome, RenderReport, Renderer,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress using indicatif ─────────────────────────────────────────────

/// Terminal progress: a download spinner, then a bar over documents.
/// Documents finish out of order, so every line names its document.
struct CliProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>4}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }
}

impl HarvestProgress for CliProgress {
    fn on_download_batch(&self, done: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.activate_bar(total, "Downloading", "files");
        }
        self.bar.set_position(done as u64);
    }

    fn on_render_start(&self, total_documents: usize) {
        self.activate_bar(total_documents, "Rendering", "documents");
    }

    fn on_document_complete(&self, name: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {:<32} {}",
            green("✓"),
            name,
            dim(&format!("{pages} pages"))
        ));
        self.bar.inc(1);
    }

    fn on_document_skipped(&self, _name: &str) {
        self.bar.inc(1);
    }

    fn on_document_error(&self, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<32} {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_render_complete(&self, report: &RenderReport) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        eprintln!(
            "{} {} documents rendered, {} already done, {} pages added{}",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&report.processed.to_string()),
            report.skipped,
            report.pages_added,
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} failed)", red(&failed.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scrape links, download every file and register it
  pdf-harvest fetch

  # Rasterise every registered document that has no pages yet
  pdf-harvest render --workers 8

  # Both, in order
  pdf-harvest run

  # Dump the document table
  pdf-harvest export --out documents.csv

ENVIRONMENT VARIABLES (also read from .env):
  SQLITE_PATH               Catalog database file (required)
  FILES_DIR                 Downloaded documents (required)
  IMAGES_DIR                Rendered page images (required)
  LINKS_TEXT_PATH           Cached link list (required)
  HARVEST_SOURCE_URL        Page to scrape for document links
  HARVEST_LINK_SELECTOR     CSS selector for document anchors
  HARVEST_BATCH_SIZE        Concurrent downloads per batch (default 4)
  HARVEST_DOWNLOAD_TIMEOUT  Seconds per download attempt (default 120)
  HARVEST_WORKERS           Render workers (default: CPU count)
  HARVEST_DPI               Render DPI, 72-600 (default 300)
  PDFIUM_LIB_PATH           Path to libpdfium; otherwise the system library is used
"#;

/// Download, catalog and rasterise batches of remote PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-harvest",
    version,
    about = "Download, catalog and rasterise batches of remote PDF documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Catalog database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory for downloaded documents.
    #[arg(long, global = true)]
    files_dir: Option<PathBuf>,

    /// Directory for rendered page images.
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    /// Cached link list.
    #[arg(long, global = true)]
    links_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire links, download documents and register them.
    Fetch(FetchArgs),
    /// Render every document that has no pages yet.
    Render(RenderArgs),
    /// `fetch` followed by `render`.
    Run {
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Export the document table as CSV.
    Export {
        /// Output file.
        #[arg(short, long, default_value = "documents.csv")]
        out: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Page to scrape for document links.
    #[arg(long)]
    source_url: Option<String>,

    /// Concurrent downloads per batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Also export the document table to this CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Render workers.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Rendering DPI (72-600).
    #[arg(long, value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,
}

impl Cli {
    /// Flag values keyed by the environment variable they override.
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut map = HashMap::new();
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        for (key, value) in [
            (env::DATABASE_PATH, path(&self.db)),
            (env::FILES_DIR, path(&self.files_dir)),
            (env::IMAGES_DIR, path(&self.images_dir)),
            (env::LINKS_CACHE_PATH, path(&self.links_file)),
        ] {
            if let Some(v) = value {
                map.insert(key, v);
            }
        }

        let (fetch, render) = match &self.command {
            Command::Fetch(f) => (Some(f), None),
            Command::Render(r) => (None, Some(r)),
            Command::Run { fetch, render } => (Some(fetch), Some(render)),
            Command::Export { .. } => (None, None),
        };
        if let Some(f) = fetch {
            if let Some(ref url) = f.source_url {
                map.insert(env::SOURCE_URL, url.clone());
            }
            if let Some(n) = f.batch_size {
                map.insert(env::BATCH_SIZE, n.to_string());
            }
        }
        if let Some(r) = render {
            if let Some(n) = r.workers {
                map.insert(env::WORKERS, n.to_string());
            }
            if let Some(dpi) = r.dpi {
                map.insert(env::DPI, dpi.to_string());
            }
        }
        map
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the process environment may carry everything.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let overrides = cli.overrides();
    let config = HarvestConfig::from_lookup(|key| {
        overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    })
    .context("Invalid configuration")?;

    let progress: Arc<dyn HarvestProgress> = if show_progress {
        CliProgress::new() as Arc<dyn HarvestProgress>
    } else {
        Arc::new(NoopProgress)
    };
    let mut harvester = Harvester::new(config);

    match cli.command {
        Command::Fetch(ref args) => {
            let report = fetch(&mut harvester, progress).await?;
            print_fetch(&report, cli.json, cli.quiet)?;
            export_after_fetch(&mut harvester, args)?;
        }
        Command::Render(_) => {
            let report = render(&mut harvester, progress).await?;
            print_render(&report, cli.json, cli.quiet || show_progress)?;
        }
        Command::Run { fetch: ref args, .. } => {
            let fetched = fetch(&mut harvester, progress.clone()).await?;
            print_fetch(&fetched, cli.json, cli.quiet)?;
            export_after_fetch(&mut harvester, args)?;
            let rendered = render(&mut harvester, progress).await?;
            print_render(&rendered, cli.json, cli.quiet || show_progress)?;
        }
        Command::Export { ref out } => {
            let rows = harvester
                .export_csv(out)
                .with_context(|| format!("Failed to export to {}", out.display()))?;
            if cli.json {
                println!("{}", serde_json::json!({ "exported": rows, "path": out }));
            } else if !cli.quiet {
                eprintln!(
                    "{} {} documents → {}",
                    green("✔"),
                    bold(&rows.to_string()),
                    out.display()
                );
            }
        }
    }

    Ok(())
}

async fn fetch(
    harvester: &mut Harvester,
    progress: Arc<dyn HarvestProgress>,
) -> Result<FetchReport> {
    let config = harvester.config();
    let extractor =
        HtmlLinkExtractor::from_config(config).context("Failed to build link extractor")?;
    let downloader = Downloader::from_config(config).progress(progress);
    harvester
        .fetch(&extractor, &downloader)
        .await
        .context("Fetch failed")
}

fn export_after_fetch(harvester: &mut Harvester, args: &FetchArgs) -> Result<()> {
    if let Some(ref path) = args.csv {
        harvester
            .export_csv(path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
    }
    Ok(())
}

async fn render(
    harvester: &mut Harvester,
    progress: Arc<dyn HarvestProgress>,
) -> Result<RenderReport> {
    let renderer: Arc<dyn Renderer> = Arc::new(
        PdfiumRenderer::from_config(harvester.config()).context("Failed to load pdfium")?,
    );
    harvester
        .render_all(renderer, progress)
        .await
        .context("Render failed")
}

fn print_fetch(report: &FetchReport, json: bool, quiet: bool) -> Result<()> {
    let registered = match report.registration {
        RegisterOutcome::Inserted(n) => n,
        RegisterOutcome::Rejected => 0,
    };
    if json {
        let failed: Vec<_> = report
            .downloads
            .failed
            .iter()
            .map(|f| serde_json::json!({ "url": f.url, "error": f.error.to_string() }))
            .collect();
        let value = serde_json::json!({
            "links": report.links,
            "downloaded": report.downloads.downloaded,
            "already_present": report.downloads.already_present,
            "failed": failed,
            "registered": registered,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialize report")?
        );
        return Ok(());
    }
    if quiet {
        return Ok(());
    }
    eprintln!(
        "{} {} links: {} downloaded, {} already present, {} failed",
        if report.downloads.is_complete() {
            green("✔")
        } else {
            red("✘")
        },
        bold(&report.links.to_string()),
        report.downloads.downloaded,
        report.downloads.already_present,
        report.downloads.failed.len()
    );
    for failed in &report.downloads.failed {
        eprintln!(
            "  {} {}  {}",
            red("✗"),
            failed.url,
            dim(&failed.error.to_string())
        );
    }
    match report.registration {
        RegisterOutcome::Inserted(n) => eprintln!("{} {} documents registered", green("✔"), n),
        RegisterOutcome::Rejected => eprintln!(
            "{}",
            dim("Catalog already holds some of these documents; nothing registered")
        ),
    }
    Ok(())
}

fn print_render(report: &RenderReport, json: bool, silent: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialize report")?
        );
    } else if !silent {
        eprintln!(
            "{} rendered, {} skipped, {} failed, {} pages added",
            report.processed, report.skipped, report.failed, report.pages_added
        );
    }
    Ok(())
}
