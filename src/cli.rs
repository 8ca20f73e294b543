//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use harvester_core::DEFAULT_MAX_RETRIES;
use harvester_core::fetch::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use harvester_core::harvest::{DEFAULT_ARXIV_SHARE, DEFAULT_PER_SECTOR, DEFAULT_TOPIC_PAGE_SIZE};

/// Harvest open-access scholarly metadata and download validated PDFs.
///
/// `harvest` builds a deduplicated corpus CSV from `OpenAlex`, arXiv, and
/// CORE; `download` fetches the PDFs listed in a CSV; `topics` downloads
/// the works of `OpenAlex` topics.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,

    /// TCP connect timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub connect_timeout_secs: u64,

    /// Per-read timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub read_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query every sector against every source and write one merged corpus CSV
    Harvest(HarvestArgs),

    /// Resolve and download the PDF of every row of a CSV
    Download(DownloadArgs),

    /// List `OpenAlex` topics for a term and download their works
    Topics(TopicsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct HarvestArgs {
    /// Corpus CSV to write
    #[arg(long, default_value = "harvest.csv")]
    pub out: PathBuf,

    /// Records requested from `OpenAlex` per sector
    #[arg(long, default_value_t = DEFAULT_PER_SECTOR as u64, value_parser = clap::value_parser!(u64).range(1..=100_000))]
    pub per_sector: u64,

    /// arXiv receives per-sector / this value records
    #[arg(long, default_value_t = DEFAULT_ARXIV_SHARE as u64, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub arxiv_share: u64,

    /// CORE API key; CORE is skipped without it
    #[arg(long)]
    pub core_key: Option<String>,

    /// Contact email sent with API requests
    #[arg(long)]
    pub email: Option<String>,

    /// Pause between pages and sources in milliseconds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub sleep_ms: u64,

    /// File of `Sector = keyword, keyword` lines replacing the built-in sectors
    #[arg(long)]
    pub sectors_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    /// CSV with pdf_url/doi/title/... columns
    #[arg(long)]
    pub input: PathBuf,

    /// Root directory for per-sector PDF folders
    #[arg(long, default_value = "pdfs")]
    pub outdir: PathBuf,

    /// Contact email (required by the OA lookup service)
    #[arg(long)]
    pub email: Option<String>,

    /// Process at most this many rows
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_rows: Option<u64>,

    /// Pause between items in milliseconds
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub sleep_ms: u64,
}

#[derive(ClapArgs, Debug)]
pub struct TopicsArgs {
    /// Term used to search topics
    #[arg(long, default_value = "technology")]
    pub search_term: String,

    /// Number of topics to list
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=200))]
    pub top_n: u64,

    /// Print the topics and exit without downloading
    #[arg(long)]
    pub list_only: bool,

    /// Root directory for per-topic folders
    #[arg(long, default_value = "downloads")]
    pub out: PathBuf,

    /// Works requested per page
    #[arg(long, default_value_t = DEFAULT_TOPIC_PAGE_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..=200))]
    pub per_page: u64,

    /// Pause between items and pages in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub sleep_ms: u64,

    /// Contact email (required unless --list-only)
    #[arg(long)]
    pub email: Option<String>,

    /// Stop each topic after this many pages
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_pages: Option<u64>,

    /// Download at most this many of the listed topics
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_topics: Option<u64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn harvest(args: &Args) -> &HarvestArgs {
        match &args.command {
            Command::Harvest(harvest) => harvest,
            other => panic!("expected harvest, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_harvest_defaults() {
        let args = Args::try_parse_from(["harvester", "harvest"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.max_retries, 2);
        assert_eq!(args.read_timeout_secs, 30);

        let harvest = harvest(&args);
        assert_eq!(harvest.out, PathBuf::from("harvest.csv"));
        assert_eq!(harvest.per_sector, 200);
        assert_eq!(harvest.arxiv_share, 4);
        assert_eq!(harvest.sleep_ms, 500);
        assert!(harvest.core_key.is_none());
        assert!(harvest.sectors_file.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["harvester", "-vv", "harvest"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["harvester", "harvest", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["harvester", "-q", "harvest"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["harvester", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Args::try_parse_from(["harvester"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    // ==================== Max Retries Tests ====================

    #[test]
    fn test_cli_max_retries_bounds() {
        let args = Args::try_parse_from(["harvester", "--max-retries", "10", "harvest"]).unwrap();
        assert_eq!(args.max_retries, 10);
        let args = Args::try_parse_from(["harvester", "harvest", "--max-retries", "0"]).unwrap();
        assert_eq!(args.max_retries, 0);

        let err = Args::try_parse_from(["harvester", "--max-retries", "11", "harvest"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Harvest Tests ====================

    #[test]
    fn test_cli_harvest_rejects_zero_per_sector() {
        let err = Args::try_parse_from(["harvester", "harvest", "--per-sector", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_harvest_all_flags() {
        let args = Args::try_parse_from([
            "harvester",
            "harvest",
            "--out",
            "corpus.csv",
            "--per-sector",
            "40",
            "--arxiv-share",
            "2",
            "--core-key",
            "k",
            "--email",
            "me@example.org",
            "--sleep-ms",
            "0",
            "--sectors-file",
            "sectors.txt",
        ])
        .unwrap();
        let harvest = harvest(&args);
        assert_eq!(harvest.per_sector, 40);
        assert_eq!(harvest.arxiv_share, 2);
        assert_eq!(harvest.core_key.as_deref(), Some("k"));
        assert_eq!(harvest.sleep_ms, 0);
        assert_eq!(harvest.sectors_file, Some(PathBuf::from("sectors.txt")));
    }

    // ==================== Download Tests ====================

    #[test]
    fn test_cli_download_requires_input() {
        let err = Args::try_parse_from(["harvester", "download"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_download_defaults() {
        let args = Args::try_parse_from(["harvester", "download", "--input", "in.csv"]).unwrap();
        let Command::Download(download) = args.command else {
            panic!("expected download");
        };
        assert_eq!(download.outdir, PathBuf::from("pdfs"));
        assert_eq!(download.sleep_ms, 800);
        assert!(download.max_rows.is_none());
        assert!(download.email.is_none());
    }

    // ==================== Topics Tests ====================

    #[test]
    fn test_cli_topics_defaults() {
        let args = Args::try_parse_from(["harvester", "topics"]).unwrap();
        let Command::Topics(topics) = args.command else {
            panic!("expected topics");
        };
        assert_eq!(topics.search_term, "technology");
        assert_eq!(topics.top_n, 5);
        assert!(!topics.list_only);
        assert_eq!(topics.out, PathBuf::from("downloads"));
        assert_eq!(topics.per_page, 200);
        assert_eq!(topics.sleep_ms, 1000);
    }

    #[test]
    fn test_cli_topics_per_page_over_max_rejected() {
        let err = Args::try_parse_from(["harvester", "topics", "--per-page", "201"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
