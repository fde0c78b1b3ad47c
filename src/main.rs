use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use citefetch::config::{default_config_path, ConfigFile, Overrides, Settings};
use citefetch::extract::{extract_from_files, find_tex_files};
use citefetch::models::{CitationKey, PreferredSource, Provenance};
use citefetch::resolve::{MergeCoordinator, MergeOptions, ResolutionEngine};
use citefetch::sources::SourceRegistry;
use citefetch::ui::{self, Spinner, Status};
use citefetch::utils::{write_atomic, HttpClient};
use citefetch::BibliographyDocument;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code when at least one citation key could not be resolved
const EXIT_UNRESOLVED: u8 = 2;

/// Exit code for fatal errors
const EXIT_FATAL: u8 = 1;

/// citefetch - Fetch BibTeX entries for the citations in a LaTeX project
#[derive(Parser, Debug)]
#[command(name = "citefetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch BibTeX entries for the citations in a LaTeX project from INSPIRE, NASA ADS and Semantic Scholar", long_about = None)]
struct Cli {
    /// A .tex file, or a directory searched recursively for .tex files
    path: PathBuf,

    /// Configuration file path [default: ~/.config/citefetch/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output bibliography [default: references.bib]
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Keep at most this many authors per entry, 0 for all [default: 3]
    #[arg(long, short = 'a')]
    max_authors: Option<usize>,

    /// Print the citation keys found and exit without fetching
    #[arg(long, short)]
    list_keys: bool,

    /// Ignore the existing bibliography and fetch every key again
    #[arg(long)]
    fresh: bool,

    /// Source to try first [default: ads]
    #[arg(long, short = 's', value_enum)]
    preferred_source: Option<SourceArg>,

    /// NASA ADS API token (also read from ADS_API_KEY)
    #[arg(long)]
    ads_api_key: Option<String>,

    /// Semantic Scholar API key (also read from SEMANTIC_SCHOLAR_API_KEY)
    #[arg(long)]
    semantic_scholar_api_key: Option<String>,

    /// Request timeout in seconds [default: 30]
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,
}

/// Source to try first
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    #[value(name = "ads")]
    Ads,
    #[value(name = "inspire")]
    Inspire,
    #[value(name = "semantic-scholar")]
    SemanticScholar,
    /// Pick per key from the key's format
    #[value(name = "auto")]
    Auto,
}

impl From<SourceArg> for PreferredSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Ads => PreferredSource::Ads,
            SourceArg::Inspire => PreferredSource::Inspire,
            SourceArg::SemanticScholar => PreferredSource::SemanticScholar,
            SourceArg::Auto => PreferredSource::Auto,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            output: self.output.clone(),
            max_authors: self.max_authors,
            preferred: self.preferred_source.map(PreferredSource::from),
            ads_api_key: self.ads_api_key.clone(),
            semantic_scholar_api_key: self.semantic_scholar_api_key.clone(),
            timeout_secs: self.timeout,
        }
    }

    /// Default log filter when RUST_LOG is not set
    fn log_filter(&self) -> String {
        let level = if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };
        format!("citefetch={}", level)
    }
}

/// Whether this run will ask ADS for anything
fn needs_ads(preferred: PreferredSource, pending: &BTreeSet<String>) -> bool {
    !pending.is_empty()
        && (preferred == PreferredSource::Ads
            || pending
                .iter()
                .any(|k| CitationKey::new(k.as_str()).provenance() == Provenance::BibcodeFormat))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_filter()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", ui::status_line(Status::Error, &format!("{:#}", e)));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().or_else(default_config_path);
    let file = match config_path {
        Some(ref path) => {
            tracing::info!("Using config file: {}", path.display());
            ConfigFile::load(path)?
        }
        None => ConfigFile::default(),
    };
    let settings = Settings::resolve(file, cli.overrides(), |name| std::env::var(name).ok())?;

    if !cli.path.exists() {
        bail!("{} does not exist", cli.path.display());
    }
    let files = find_tex_files(&cli.path);
    if files.is_empty() {
        tracing::warn!("No .tex files found under {}", cli.path.display());
    }

    let extraction = extract_from_files(&files);
    if !cli.quiet {
        for warning in &extraction.warnings {
            ui::print_status(Status::Warning, warning);
        }
        ui::print_status(
            Status::Info,
            &format!("Found {} unique citation keys", extraction.keys.len()),
        );
    }

    if cli.list_keys {
        for key in &extraction.keys {
            println!("{}", key);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let existing = if cli.fresh || !settings.output.exists() {
        BibliographyDocument::new()
    } else {
        BibliographyDocument::read(&settings.output)
            .with_context(|| format!("Failed to read {}", settings.output.display()))?
    };

    let pending: BTreeSet<String> = extraction
        .keys
        .iter()
        .filter(|k| !existing.contains(k))
        .cloned()
        .collect();
    if settings.credentials.ads_api_key.is_none() && needs_ads(settings.preferred, &pending) {
        let msg = "No ADS API key configured (set ADS_API_KEY or --ads-api-key); ADS lookups will fail";
        tracing::warn!("{}", msg);
        if !cli.quiet {
            ui::print_status(Status::Warning, msg);
        }
    }

    let http = HttpClient::new(settings.timeout)?;
    let engine = ResolutionEngine::new(SourceRegistry::with_live_sources(
        http,
        &settings.credentials,
    ));
    let options = MergeOptions {
        fresh: cli.fresh,
        max_authors: settings.max_authors,
        preferred: settings.preferred,
    };

    let spinner = Spinner::new(cli.quiet);
    let report = MergeCoordinator::new(&engine, options)
        .run(&extraction.keys, existing, &spinner)
        .await;
    spinner.finish();

    let changed = report.fetched_count() + report.duplicate_count() > 0;
    if changed || cli.fresh || !settings.output.exists() {
        write_atomic(&settings.output, &report.document.to_bibtex())
            .with_context(|| format!("Failed to write {}", settings.output.display()))?;
    }

    if !cli.quiet {
        ui::print_section("Summary");
        if let Some(table) = ui::problem_table(&report) {
            println!("{table}");
        }
        ui::print_status(
            Status::Success,
            &format!(
                "Wrote {} new entries to {} ({})",
                report.fetched_count(),
                settings.output.display(),
                ui::summary_line(&report)
            ),
        );
    }

    if report.unresolved().is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_UNRESOLVED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "citefetch",
            "paper/",
            "-o",
            "refs.bib",
            "-a",
            "0",
            "-s",
            "semantic-scholar",
            "--fresh",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.path, PathBuf::from("paper/"));
        assert!(cli.fresh);
        assert!(!cli.list_keys);
        let overrides = cli.overrides();
        assert_eq!(overrides.output, Some(PathBuf::from("refs.bib")));
        assert_eq!(overrides.max_authors, Some(0));
        assert_eq!(overrides.preferred, Some(PreferredSource::SemanticScholar));
        assert_eq!(overrides.timeout_secs, None);
        assert_eq!(cli.log_filter(), "citefetch=debug");
    }

    #[test]
    fn test_unset_flags_do_not_override() {
        let cli = Cli::try_parse_from(["citefetch", "main.tex", "-q"]).unwrap();
        assert_eq!(cli.overrides(), Overrides::default());
        assert_eq!(cli.log_filter(), "citefetch=error");
        assert!(Cli::try_parse_from(["citefetch", "main.tex", "-s", "google"]).is_err());
    }

    #[test]
    fn test_needs_ads() {
        let keys = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();

        assert!(needs_ads(PreferredSource::Ads, &keys(&["Smith:2020abc"])));
        assert!(!needs_ads(PreferredSource::Inspire, &keys(&["Smith:2020abc"])));
        assert!(needs_ads(PreferredSource::Inspire, &keys(&["2016PhRvL.116f1102A"])));
        assert!(!needs_ads(PreferredSource::Ads, &BTreeSet::new()));
    }
}
