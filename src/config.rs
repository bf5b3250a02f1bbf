use crate::Error;
use simple_error::simple_error;
use std::env::var;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ENV_FILE: &str = "line.env";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_API_ENDPOINT: &str = "https://api.line.me";

#[derive(Debug, Clone, PartialEq)]
pub enum QueueBackend {
    Local { capacity: usize },
    Sqs { queue_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub channel_secret: String,
    pub channel_token: String,
    pub bind_address: String,
    pub api_endpoint: String,
    pub task_base_url: String,
    pub queue_backend: QueueBackend,
    pub retry_policy: RetryPolicy,
    pub task_deadline: Duration,
    pub max_in_flight: usize,
    pub dev_server: bool,
}

impl Config {
    /// Loads the env file, then reads the process environment.
    pub fn load() -> Result<Config, Error> {
        let env_file = var("LINE_ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
        dotenvy::from_filename(&env_file).map_err(|e| {
            Box::new(simple_error!(format!(
                "Failed to load env file {}.\n{:?}",
                env_file, e
            )))
        })?;
        Config::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, Error> {
            match lookup(key) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(Box::new(simple_error!(format!("Env var {} undefined.", key)))),
            }
        };
        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.into());
        let task_base_url = match lookup("TASK_BASE_URL") {
            Some(url) => url,
            None => _loopback_url(&bind_address)?,
        };
        let queue_backend = match lookup("QUEUE_BACKEND").as_deref() {
            None | Some("local") => QueueBackend::Local {
                capacity: _parse_or(&lookup, "QUEUE_CAPACITY", 1000)?,
            },
            Some("sqs") => QueueBackend::Sqs {
                queue_url: required("SQS_QUEUE_URL")?,
            },
            Some(other) => {
                return Err(Box::new(simple_error!(format!(
                    "Unrecognized QUEUE_BACKEND {}.",
                    other
                ))))
            }
        };
        Ok(Config {
            channel_secret: required("LINE_BOT_CHANNEL_SECRET")?,
            channel_token: required("LINE_BOT_CHANNEL_TOKEN")?,
            api_endpoint: lookup("LINE_API_ENDPOINT").unwrap_or_else(|| DEFAULT_API_ENDPOINT.into()),
            bind_address,
            task_base_url,
            queue_backend,
            retry_policy: RetryPolicy {
                max_attempts: _parse_or(&lookup, "DISPATCH_MAX_ATTEMPTS", 5)?,
                base_delay: Duration::from_millis(_parse_or(&lookup, "DISPATCH_BASE_DELAY_MS", 1000)?),
            },
            task_deadline: Duration::from_secs(_parse_or(&lookup, "TASK_DEADLINE_SECS", 600)?),
            max_in_flight: _parse_or(&lookup, "DISPATCH_MAX_IN_FLIGHT", 32)?,
            dev_server: lookup("RUN_WITH_DEVAPPSERVER").map_or(false, |v| !v.is_empty()),
        })
    }
}

fn _parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            Box::new(simple_error!(format!(
                "Env var {} has invalid value {}.\n{:?}",
                key, raw, e
            ))) as Error
        }),
        None => Ok(default),
    }
}

// The dispatcher calls back into this process when no base url is given.
fn _loopback_url(bind_address: &str) -> Result<String, Error> {
    match bind_address.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => Ok(format!("http://127.0.0.1:{}", port)),
        _ => Err(Box::new(simple_error!(format!(
            "BIND_ADDRESS {} has no port.",
            bind_address
        )))),
    }
}
