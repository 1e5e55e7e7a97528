use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Storage root used when `CN_PATH` is not set.
pub const DEFAULT_STORAGE_PATH: &str = "./storage/";

/// Seconds between keep-alive pings on an idle watch connection.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory under which every stored file lives. Always treated as a
    /// directory: a value like `./data/x_` stores into `./data/x_/`, it is not
    /// used as a file-name prefix.
    #[arg(long, env = "CN_PATH", default_value = DEFAULT_STORAGE_PATH)]
    storage_path: String,

    /// Shared secret clients must present as a bearer token or `q` query parameter.
    #[arg(long, env = "CN_AUTH", default_value = "", hide_env_values = true)]
    auth_token: String,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: String,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Seconds between `ping` events sent to each watch subscriber
    #[arg(long, env, default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS)]
    pub heartbeat_interval_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
            auth_token: String::new(),
            interface: "0.0.0.0".to_string(),
            port: 8080,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            log_level_filter: LevelFilter::Info,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn set_storage_path(mut self, storage_path: impl Into<String>) -> Self {
        self.storage_path = storage_path.into();
        self
    }

    pub fn set_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = auth_token.into();
        self
    }

    /// Returns the storage root, always terminated by a `/` so that keys can be
    /// appended directly. An empty value means the working directory.
    pub fn storage_path(&self) -> String {
        if self.storage_path.is_empty() {
            "./".to_string()
        } else if self.storage_path.ends_with('/') {
            self.storage_path.clone()
        } else {
            format!("{}/", self.storage_path)
        }
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }
}
