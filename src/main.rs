//! Toongrab CLI - webtoon catalog search and chapter downloader.

use anyhow::Context;
use clap::{Parser, Subcommand};

use toongrab::config::Config;
use toongrab::error::Result;
use toongrab::console::Console;
use toongrab::download::{ChapterStatus, DownloadEngine, DownloadOptions, Progress};
use toongrab::extract::{parse_manga_details, parse_search_results, search_url};
use toongrab::fetch::Fetcher;
use toongrab::select::resolve_selection;

/// Webtoon catalog search and chapter downloader.
#[derive(Parser, Debug)]
#[command(name = "toongrab")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the catalog for a title.
    Search {
        /// Words of the search query.
        query: Vec<String>,
    },

    /// Download chapters from a title's page URL.
    Scrape {
        /// URL of the manga's detail page.
        url: String,

        /// Chapters to download, e.g. "1,5-7" or "all".
        #[arg(default_value = "all")]
        chapters: String,

        /// Merge each downloaded chapter into a PDF.
        #[arg(long)]
        pdf: bool,

        /// Delete images after successful PDF conversion.
        #[arg(long)]
        delete: bool,

        /// Number of concurrent downloads.
        #[arg(long, short = 't')]
        threads: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let console = Console::new();

    // Single terminal error line for anything that escapes a command.
    if let Err(e) = run(&console).await {
        console.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(console: &Console) -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let fetcher = Fetcher::new(&config.network).context("Failed to build HTTP client")?;

    match args.command {
        Command::Search { query } => search(console, &config, &fetcher, &query.join(" ")).await,
        Command::Scrape {
            url,
            chapters,
            pdf,
            delete,
            threads,
        } => scrape(console, &config, fetcher, &url, &chapters, pdf, delete, threads).await,
    }
}

async fn search(console: &Console, config: &Config, fetcher: &Fetcher, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("Search query must not be empty");
    }

    console.step(&format!("Searching for: {}", query));
    let url = search_url(&config.site.base_url, &config.site.search_path, query);
    let html = fetcher
        .fetch_html(&url)
        .await
        .context("Could not retrieve search results")?;

    let results = parse_search_results(&html);
    if results.is_empty() {
        console.warning("No results found.");
        return Ok(());
    }

    console.success(&format!("Found {} results", console.count(results.len())));
    for (i, result) in results.iter().enumerate() {
        println!("{:>3}. {}  {}", i + 1, result.title, console.muted(&result.url));
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn scrape(
    console: &Console,
    config: &Config,
    fetcher: Fetcher,
    url: &str,
    selector: &str,
    pdf: bool,
    delete: bool,
    threads: Option<usize>,
) -> Result<()> {
    console.step(&format!("Fetching manga page: {}", url));
    let html = fetcher
        .fetch_html(url)
        .await
        .context("Could not retrieve manga page")?;
    let details = parse_manga_details(&html).context("Could not parse manga details")?;

    console.success(&format!("Found manga: {}", details.title));
    console.section(&format!("{} chapters", details.chapters.len()));
    for chapter in &details.chapters {
        println!("{:>8}  {}", chapter.display_number(), chapter.title);
    }

    // Selection errors abort before any download starts.
    let selected = resolve_selection(selector, &details.chapters)?;
    if selected.is_empty() {
        console.warning("No chapters matched the selection.");
        return Ok(());
    }
    console.info(&format!("Selected {} chapters", selected.len()));

    let mut options = DownloadOptions {
        create_pdf: pdf,
        delete_images: delete,
        workers: config.download.workers,
        directory: config.download.directory.clone(),
    };
    if let Some(threads) = threads {
        options.workers = threads.max(1);
    }

    let progress_console = *console;
    let engine = DownloadEngine::new(fetcher, options, *console).on_progress(move |p: Progress| {
        progress_console.info(&format!(
            "Progress: {}% ({}/{} chapters)",
            p.percent(),
            p.completed,
            p.total
        ));
    });

    let reports = engine.run(&details.title, selected).await?;

    let skipped = reports
        .iter()
        .filter(|r| r.status == ChapterStatus::Skipped)
        .count();
    if skipped > 0 {
        console.warning(&format!("{} chapters skipped", skipped));
    }
    console.success(&format!(
        "Downloaded {} of {} chapters",
        reports.len() - skipped,
        reports.len()
    ));

    Ok(())
}
