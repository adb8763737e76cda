use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Marker span that only becomes visible once the quiz has been graded.
pub const DEFAULT_QUIZ_READY_SELECTOR: &str =
    "section[class^='indQuest'] label span:nth-of-type(2):not(.d-none)";

/// Run-wide settings, built once in `main` and handed to the harvester.
#[derive(Debug, Clone)]
pub struct Config {
    /// Portal root that `data-linktarget` paths are resolved against.
    pub base_url: Url,
    /// First identifier component and the per-site directory name.
    pub site_name: String,
    /// Newline-delimited list of course URLs.
    pub input: PathBuf,
    pub cache_root: PathBuf,
    pub output_root: PathBuf,
    /// Persistent browser profile. Defaults to `<cache_root>/cookies/Chrome`.
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub nav_timeout: Duration,
    pub quiz: QuizSettings,
}

/// How the fetcher decides a submitted quiz has finished re-rendering.
#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub submit_selector: String,
    pub confirm_selector: String,
    /// Polled after the confirm click. `None` skips straight to the settle delay.
    pub ready_selector: Option<String>,
    pub ready_timeout: Duration,
    /// Blind delay used when the ready selector never shows up.
    pub settle_delay: Duration,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            submit_selector: "button[type='submit']".to_string(),
            confirm_selector: "button[id='ckSubmit']".to_string(),
            ready_selector: Some(DEFAULT_QUIZ_READY_SELECTOR.to_string()),
            ready_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(1000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://learninglink.oup.com").expect("static URL is valid"),
            site_name: "Oxford".to_string(),
            input: PathBuf::from("urls.txt"),
            cache_root: PathBuf::from("downloaded_files"),
            output_root: PathBuf::from("Output"),
            profile_dir: None,
            headless: false,
            chrome_executable: None,
            nav_timeout: Duration::from_secs(60),
            quiz: QuizSettings::default(),
        }
    }
}

impl Config {
    /// Cache directory for this site's pages and spreadsheets.
    pub fn site_cache_dir(&self) -> PathBuf {
        self.cache_root.join(&self.site_name)
    }

    pub fn site_output_dir(&self) -> PathBuf {
        self.output_root.join(&self.site_name)
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir
            .clone()
            .unwrap_or_else(|| self.cache_root.join("cookies").join("Chrome"))
    }

    /// Where the browser drops files it is told to download.
    pub fn download_dir(&self) -> PathBuf {
        self.site_cache_dir().join("downloads")
    }
}
