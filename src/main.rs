mod alerts;
mod changes;
mod cli;
mod config;
mod database;
mod diff;
mod error;
mod extractor;
mod fetcher;
mod fields;
mod hash;
mod logs;
mod monitor;
mod reports;
mod schema;
mod snapshots;
mod store;
mod tracked_urls;

use cli::Cli;
use config::{Config, CONFIG};
use directories::ProjectDirs;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use log::{debug, error};

fn main() {
    let project_dirs = match ProjectDirs::from("", "", "pagepulse") {
        Some(dirs) => dirs,
        None => {
            eprintln!("Could not determine the project directory");
            std::process::exit(1);
        }
    };

    let config = Config::load_config(&project_dirs);
    let log_spec = config.logging.log_spec();
    // Only fails if already set, which cannot happen this early
    let _ = CONFIG.set(config);

    let _logger = match setup_logging(&project_dirs, &log_spec) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logging: {}", e);
            None
        }
    };

    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());

    if let Err(err) = Cli::handle_command_line(&project_dirs) {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn setup_logging(
    project_dirs: &ProjectDirs,
    log_spec: &str,
) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let log_dir = project_dirs.data_local_dir().join("logs");

    Logger::try_with_str(log_spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename("pagepulse"),
        )
        .rotate(
            Criterion::Size(10 * 1024 * 1024),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(7),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .format_for_files(flexi_logger::detailed_format)
        .start()
}
