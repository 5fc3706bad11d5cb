//! Command-line interface definitions.
//!
//! All arguments can be provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for one ingestion run.
///
/// # Examples
///
/// ```sh
/// # Store into ./news.db with defaults
/// market_news_ingest --database ./news.db
///
/// # Custom config and a JSON run report
/// market_news_ingest -d ./news.db -c config.yaml -j ./reports
///
/// # Everything except the insert
/// NEWS_DATABASE=./news.db market_news_ingest --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file holding the news tables
    #[arg(short, long, env = "NEWS_DATABASE")]
    pub database: String,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory for the JSON run report
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Collect, enrich, filter and dedup, but do not insert
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "market_news_ingest",
            "--database",
            "./news.db",
            "--json-output-dir",
            "./json",
        ]);

        assert_eq!(cli.database, "./news.db");
        assert_eq!(cli.json_output_dir.as_deref(), Some("./json"));
        assert!(cli.config.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "market_news_ingest",
            "-d",
            "/tmp/news.db",
            "-c",
            "/tmp/config.yaml",
            "-j",
            "/tmp/json",
            "--dry-run",
        ]);

        assert_eq!(cli.database, "/tmp/news.db");
        assert_eq!(cli.config.as_deref(), Some("/tmp/config.yaml"));
        assert_eq!(cli.json_output_dir.as_deref(), Some("/tmp/json"));
        assert!(cli.dry_run);
    }
}
