use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use reqwest::Url;
use tracing_subscriber::filter::LevelFilter;

use grist_coordinator::CoordinatorConfig;

#[cfg(feature = "prod-pool")]
const DEFAULT_POOL_URL: &str = "http://pool.gristmill.internal:8990";

#[cfg(not(feature = "prod-pool"))]
const DEFAULT_POOL_URL: &str = "http://127.0.0.1:8990";

fn default_pool_url() -> Url {
    Url::parse(DEFAULT_POOL_URL).expect("DEFAULT_POOL_URL must be a valid URL")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "gristmill", version, about = "Gristmill map/reduce job coordinator")]
pub struct Cli {
    /// Job descriptor JSON file, as persisted by the ingress.
    pub job_file: PathBuf,

    /// Worker-pool dispatcher base URL.
    #[arg(long, env = "GRIST_POOL_URL", default_value_t = default_pool_url())]
    pub pool_url: Url,

    /// Per-partition node failures tolerated before the job aborts.
    #[arg(
        long,
        env = "GRIST_MAX_FAILURE_RATE",
        default_value_t = CoordinatorConfig::DEFAULT_MAX_FAILURE_RATE
    )]
    pub max_failure_rate: usize,

    /// Directory where finalized per-job event logs are written.
    #[arg(long, env = "GRIST_EVENTS_DIR")]
    pub events_dir: Option<PathBuf>,

    /// Log verbosity.
    #[arg(long, env = "GRIST_LOG", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}
