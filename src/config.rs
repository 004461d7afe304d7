use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

pub static CONFIG: OnceCell<Config> = OnceCell::new();

const ENV_PREFIX: &str = "PAGEPULSE_";
const DB_FILENAME: &str = "pagepulse.db";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    pub pagepulse: String,
    pub http: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const PAGEPULSE_LEVEL: &str = "info";
    const HTTP_LEVEL: &str = "warn";

    fn default() -> Self {
        LoggingConfig {
            pagepulse: Self::PAGEPULSE_LEVEL.to_string(),
            http: Self::HTTP_LEVEL.to_string(),
        }
    }

    /// Log specification understood by flexi_logger. The http level also
    /// governs the HTML parser stack, which is chatty at debug.
    pub fn log_spec(&self) -> String {
        format!(
            "{}, reqwest={}, hyper={}, html5ever={}, selectors={}",
            self.pagepulse, self.http, self.http, self.http, self.http
        )
    }

    fn ensure_valid(&mut self) {
        self.pagepulse = Self::valid_level("pagepulse", &self.pagepulse, Self::PAGEPULSE_LEVEL);
        self.http = Self::valid_level("http", &self.http, Self::HTTP_LEVEL);
    }

    fn valid_level(name: &str, level: &str, default: &str) -> String {
        let normalized = level.trim().to_ascii_lowercase();
        if Self::LOG_LEVELS.contains(&normalized.as_str()) {
            normalized
        } else {
            eprintln!(
                "Config error: {} log level of '{}' is invalid - using default of '{}'",
                name, level, default
            );
            default.to_owned()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FetchConfig {
    timeout_secs: u64,
    user_agent: String,
}

impl FetchConfig {
    const TIMEOUT_SECS: u64 = 30;
    const MAX_TIMEOUT_SECS: u64 = 600;
    const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn new(timeout_secs: u64, user_agent: &str) -> Self {
        let mut fetch = FetchConfig {
            timeout_secs,
            user_agent: user_agent.to_owned(),
        };
        fetch.ensure_valid();
        fetch
    }

    fn default() -> Self {
        FetchConfig {
            timeout_secs: Self::TIMEOUT_SECS,
            user_agent: Self::USER_AGENT.to_owned(),
        }
    }

    fn ensure_valid(&mut self) {
        if self.timeout_secs == 0 || self.timeout_secs > Self::MAX_TIMEOUT_SECS {
            eprintln!(
                "Config error: fetch timeout of {} seconds is invalid - using default of {}",
                self.timeout_secs,
                Self::TIMEOUT_SECS
            );
            self.timeout_secs = Self::TIMEOUT_SECS;
        }

        if self.user_agent.trim().is_empty() {
            eprintln!("Config error: empty fetch user_agent - using default");
            self.user_agent = Self::USER_AGENT.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Explicit database file. Empty means "pagepulse.db in the data directory".
    pub path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub fetch: FetchConfig,
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            fetch: FetchConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file located in the app's data directory.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join("config.toml");

        if !config_path.exists() {
            Self::write_default(&config_path);
        }

        Self::load_from(&config_path)
    }

    /// Defaults, then the TOML file at `config_path` (if present), then
    /// `PAGEPULSE_` environment variables. `__` separates nested keys, e.g.
    /// `PAGEPULSE_FETCH__TIMEOUT_SECS=10`.
    pub fn load_from(config_path: &Path) -> Self {
        let default_config = Config::default();

        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    /// Returns the global configuration, falling back to defaults when
    /// `main` has not installed one (unit tests, library use).
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::default)
    }

    pub fn database_path(&self, project_dirs: &ProjectDirs) -> PathBuf {
        if self.database.path.trim().is_empty() {
            project_dirs.data_local_dir().join(DB_FILENAME)
        } else {
            PathBuf::from(self.database.path.trim())
        }
    }

    fn write_default(config_path: &Path) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
            }
        }
        match toml::to_string_pretty(&Config::default()) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(_) => eprintln!("Failed to serialize default config."),
        }
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.fetch.ensure_valid();
    }
}
