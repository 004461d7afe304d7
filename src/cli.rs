use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::info;

use crate::alerts::Alerts;
use crate::config::Config;
use crate::database::Database;
use crate::error::PagePulseError;
use crate::extractor::Extractor;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::logs::LogEntry;
use crate::monitor::{CheckTarget, Monitor};
use crate::reports::Reports;
use crate::store::SqliteStore;
use crate::tracked_urls::{Frequency, TrackedUrl};

#[derive(Parser)]
#[command(
    name = "pagepulse",
    version,
    about = "pagePulse: SEO change tracking for web pages"
)]
pub struct Cli {
    /// Database file (overrides `database.path` from the configuration)
    #[arg(long = "db-path", global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Track a URL. Runs a baseline check right away when monitoring is enabled
    AddUrl {
        #[arg(long)]
        project: i64,

        #[arg(long)]
        url: String,

        #[arg(long, default_value = "daily")]
        frequency: Frequency,

        /// Register the URL without monitoring it
        #[arg(long, default_value_t = false)]
        disabled: bool,
    },

    /// Check a single tracked URL now
    Check {
        #[arg(long = "url-id")]
        url_id: i64,

        /// Capture a baseline without creating logs
        #[arg(long, default_value_t = false)]
        initial: bool,
    },

    /// Enable or disable monitoring of a tracked URL and set its frequency
    SetMonitoring {
        #[arg(long = "url-id")]
        url_id: i64,

        #[arg(long, default_value = "daily")]
        frequency: Frequency,

        #[arg(long, default_value_t = false)]
        disabled: bool,
    },

    /// Check every enabled URL whose frequency period has elapsed
    CheckDue,

    /// Show the most recent logs of a project, or of a single URL
    Logs {
        #[arg(long, required_unless_present = "url_id", conflicts_with = "url_id")]
        project: Option<i64>,

        #[arg(long = "url-id")]
        url_id: Option<i64>,

        #[arg(long, short = 'c', default_value_t = 10)]
        count: usize,
    },

    /// Show hash collision alerts recorded for a URL
    Alerts {
        #[arg(long = "url-id")]
        url_id: i64,
    },

    /// Fetch a page and print what would be stored, without persisting anything
    Extract {
        #[arg(long)]
        url: String,
    },
}

impl Cli {
    pub fn handle_command_line(project_dirs: &ProjectDirs) -> Result<(), PagePulseError> {
        let args = Cli::parse();
        let config = Config::get();

        let db_path = args
            .db_path
            .clone()
            .unwrap_or_else(|| config.database_path(project_dirs));

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| PagePulseError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(Self::run(args.command, config, &db_path))
    }

    fn open_monitor(config: &Config, db_path: &Path) -> Result<Monitor<HttpFetcher, SqliteStore>, PagePulseError> {
        let db = Database::open(db_path)?;
        Ok(Monitor::new(HttpFetcher::new(&config.fetch)?, SqliteStore::new(db)))
    }

    async fn run(command: Command, config: &Config, db_path: &Path) -> Result<(), PagePulseError> {
        match command {
            Command::AddUrl {
                project,
                url,
                frequency,
                disabled,
            } => {
                url::Url::parse(&url).map_err(|_| PagePulseError::InvalidUrl(url.clone()))?;
                let monitor = Self::open_monitor(config, db_path)?;
                let tracked = {
                    let conn = monitor.store().db().conn()?;
                    TrackedUrl::create(&conn, project, &url, frequency, !disabled, Utc::now().timestamp())?
                };
                info!("Tracking {} as url {}", tracked.url(), tracked.url_id());
                Reports::print_tracked_url(&tracked);

                if tracked.monitoring_enabled() {
                    let outcome = monitor.check_url(tracked.url_id(), project, true).await;
                    Reports::print_outcome(&outcome);
                }
                Ok(())
            }
            Command::Check { url_id, initial } => {
                let monitor = Self::open_monitor(config, db_path)?;
                let tracked = {
                    let conn = monitor.store().db().conn()?;
                    TrackedUrl::get_by_id(&conn, url_id)?
                        .ok_or_else(|| PagePulseError::NotFound(format!("url {}", url_id)))?
                };
                let outcome = monitor.check_url(url_id, tracked.project_id(), initial).await;
                Reports::print_outcome(&outcome);
                Ok(())
            }
            Command::SetMonitoring {
                url_id,
                frequency,
                disabled,
            } => {
                let db = Database::open(db_path)?;
                let conn = db.conn()?;
                TrackedUrl::set_monitoring(&conn, url_id, !disabled, frequency)?;
                let tracked = TrackedUrl::get_by_id(&conn, url_id)?
                    .ok_or_else(|| PagePulseError::NotFound(format!("url {}", url_id)))?;
                Reports::print_tracked_url(&tracked);
                Ok(())
            }
            Command::CheckDue => {
                let monitor = Self::open_monitor(config, db_path)?;
                let due = {
                    let conn = monitor.store().db().conn()?;
                    TrackedUrl::list_due(&conn, Utc::now().timestamp())?
                };
                info!("{} url(s) due for a check", due.len());

                let targets: Vec<CheckTarget> = due
                    .iter()
                    .map(|tracked| CheckTarget {
                        url_id: tracked.url_id(),
                        project_id: tracked.project_id(),
                    })
                    .collect();
                let summary = monitor.check_batch(&targets).await;
                Reports::print_batch(&summary);
                Ok(())
            }
            Command::Logs {
                project,
                url_id,
                count,
            } => {
                let db = Database::open(db_path)?;
                let conn = db.conn()?;
                let logs = match (project, url_id) {
                    (Some(project), _) => LogEntry::list_for_project(&conn, project, count)?,
                    (None, Some(url_id)) => {
                        let mut logs = LogEntry::list_for_url(&conn, url_id)?;
                        logs.truncate(count);
                        logs
                    }
                    (None, None) => {
                        return Err(PagePulseError::Error("Specify --project or --url-id".to_string()))
                    }
                };
                Reports::print_logs(&logs);
                Ok(())
            }
            Command::Alerts { url_id } => {
                let db = Database::open(db_path)?;
                let conn = db.conn()?;
                let alerts = Alerts::list_for_url(&conn, url_id)?;
                Reports::print_alerts(&alerts)
            }
            Command::Extract { url } => {
                let fetcher = HttpFetcher::new(&config.fetch)?;
                let body = fetcher.fetch(&url).await?;
                Reports::print_extraction(&Extractor::extract(&body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_requires_a_command() {
        let result = Cli::try_parse_from(["pagepulse"]);
        assert!(result.is_err(), "Should reject a missing command");
    }

    #[test]
    fn test_cli_parsing_add_url() {
        let cli = Cli::try_parse_from([
            "pagepulse",
            "add-url",
            "--project",
            "4",
            "--url",
            "https://acme.test/",
            "--frequency",
            "weekly",
        ])
        .unwrap();

        match cli.command {
            Command::AddUrl {
                project,
                url,
                frequency,
                disabled,
            } => {
                assert_eq!(project, 4);
                assert_eq!(url, "https://acme.test/");
                assert_eq!(frequency, Frequency::Weekly);
                assert!(!disabled);
            }
            _ => panic!("Expected add-url"),
        }
    }

    #[test]
    fn test_cli_parsing_check_with_global_db_path() {
        let cli = Cli::try_parse_from(["pagepulse", "check", "--url-id", "7", "--initial", "--db-path", "/tmp/p.db"])
            .unwrap();

        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/p.db")));
        assert!(matches!(cli.command, Command::Check { url_id: 7, initial: true }));
    }

    #[test]
    fn test_cli_parsing_set_monitoring() {
        let cli = Cli::try_parse_from(["pagepulse", "set-monitoring", "--url-id", "3", "--disabled"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::SetMonitoring {
                url_id: 3,
                frequency: Frequency::Daily,
                disabled: true
            }
        ));
    }

    #[test]
    fn test_cli_parsing_logs_default_count() {
        let cli = Cli::try_parse_from(["pagepulse", "logs", "--project", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Logs {
                project: Some(2),
                url_id: None,
                count: 10
            }
        ));

        let cli = Cli::try_parse_from(["pagepulse", "logs", "--url-id", "5", "-c", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Logs {
                project: None,
                url_id: Some(5),
                count: 3
            }
        ));

        assert!(Cli::try_parse_from(["pagepulse", "logs"]).is_err());
        assert!(Cli::try_parse_from(["pagepulse", "logs", "--project", "1", "--url-id", "2"]).is_err());
    }

    #[test]
    fn test_cli_parsing_invalid_arguments() {
        let result = Cli::try_parse_from(["pagepulse", "nonexistent-command"]);
        assert!(result.is_err(), "Should reject unknown commands");

        let result = Cli::try_parse_from(["pagepulse", "check-due", "--invalid-flag"]);
        assert!(result.is_err(), "Should reject unknown flags on check-due");

        let result = Cli::try_parse_from(["pagepulse", "add-url", "--project", "1", "--url", "x", "--frequency", "hourly"]);
        assert!(result.is_err(), "Should reject unknown frequencies");
    }
}
