use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use study_harvester::browser::chrome::{ChromeOptions, ChromeSession};
use study_harvester::config::{Config, QuizSettings, DEFAULT_QUIZ_READY_SELECTOR};
use study_harvester::Harvester;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "study-harvester")]
#[command(about = "Harvest Oxford Learning Link flashcards and quizzes into CSV", long_about = None)]
struct Args {
    /// File with one course URL per line
    #[arg(short, long, default_value = "urls.txt")]
    input: PathBuf,

    /// Root of the page/spreadsheet cache
    #[arg(long, default_value = "downloaded_files")]
    cache_dir: PathBuf,

    /// Root of the CSV output tree
    #[arg(short, long, default_value = "Output")]
    output_dir: PathBuf,

    /// Persistent browser profile (default: <cache-dir>/cookies/Chrome)
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Portal root that course links are resolved against
    #[arg(long, default_value = "https://learninglink.oup.com")]
    base_url: Url,

    /// Site name used in identifiers and directory names
    #[arg(long, default_value = "Oxford")]
    site_name: String,

    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Path to the Chrome executable
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Navigation timeout in seconds
    #[arg(long, default_value = "60")]
    nav_timeout: u64,

    /// Selector that appears once a submitted quiz is graded ("" to disable)
    #[arg(long, default_value = DEFAULT_QUIZ_READY_SELECTOR)]
    quiz_ready_selector: String,

    /// Seconds to wait for the graded-quiz selector
    #[arg(long, default_value = "10")]
    quiz_ready_timeout: u64,

    /// Fixed delay in milliseconds when the graded-quiz selector never appears
    #[arg(long, default_value = "1000")]
    quiz_settle_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let ready_selector = Some(args.quiz_ready_selector).filter(|s| !s.trim().is_empty());
        Config {
            base_url: args.base_url,
            site_name: args.site_name,
            input: args.input,
            cache_root: args.cache_dir,
            output_root: args.output_dir,
            profile_dir: args.profile_dir,
            headless: args.headless,
            chrome_executable: args.chrome,
            nav_timeout: Duration::from_secs(args.nav_timeout),
            quiz: QuizSettings {
                ready_selector,
                ready_timeout: Duration::from_secs(args.quiz_ready_timeout),
                settle_delay: Duration::from_millis(args.quiz_settle_ms),
                ..QuizSettings::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = Config::from(args);
    let session = ChromeSession::new(ChromeOptions::from(&config));
    let mut harvester = Harvester::new(config.clone(), session);

    let outcome = harvester.run().await;
    let pages_fetched = harvester.fetcher().fetch_count();
    harvester.finish().await.context("failed to close the browser")?;
    let reports =
        outcome.with_context(|| format!("harvest from {} failed", config.input.display()))?;

    let files: usize = reports.iter().map(|r| r.files.len()).sum();
    log::info!(
        "✅ {} course(s), {} file(s) written, {} page(s) fetched",
        reports.len(),
        files,
        pages_fetched
    );
    Ok(())
}
