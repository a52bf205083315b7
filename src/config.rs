use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

pub const ENV_ACTIVATION_URL: &str = "PO_AUTOMATION_ACTIVATION_URL";
pub const ENV_OUTPUT_DIR: &str = "PO_AUTOMATION_OUTPUT_DIR";
pub const ENV_CONCURRENCY: &str = "PO_AUTOMATION_CONCURRENCY";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "PO_AUTOMATION_HTTP_TIMEOUT_SECS";

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Runtime settings. Loaded from `.env` and the process environment; CLI flags override.
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint answering `true` when the installation is activated. `None` skips the check.
    pub activation_url: Option<String>,
    /// Where new output workbooks go. `None` means next to the first input file.
    pub output_dir: Option<PathBuf>,
    /// Documents decoded at once by the batch runner.
    pub concurrency: usize,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation_url: None,
            output_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

fn load_env() {
    let _ = dotenvy::dotenv();
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        load_env();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let concurrency = match non_empty(ENV_CONCURRENCY) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(AppError::Config(format!(
                        "{} must be a positive integer, got '{}'",
                        ENV_CONCURRENCY, raw
                    )))
                }
            },
            None => DEFAULT_CONCURRENCY,
        };

        let timeout_secs = match non_empty(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_HTTP_TIMEOUT_SECS, raw
                ))
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            activation_url: non_empty(ENV_ACTIVATION_URL),
            output_dir: non_empty(ENV_OUTPUT_DIR).map(PathBuf::from),
            concurrency,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
