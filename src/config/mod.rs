//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rollout-store";
const ENV_PREFIX: &str = "ROLLOUT_STORE";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_CACHE_DB: u32 = 0;
const DEFAULT_METRICS_DB: u32 = 1;

/// Command-line arguments for the rollout-store operator tool.
#[derive(Debug, Parser)]
#[command(
    name = "rollout-store",
    version,
    about = "Inspect and maintain the rollout response cache and counters"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "ROLLOUT_STORE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Ping the cache and metrics databases.
    Health,
    /// Print the rollout counters of a deployment as JSON.
    Metrics(DeploymentArgs),
    /// Delete every counter and client label of a deployment.
    ClearMetrics(DeploymentArgs),
    /// Drop the cached responses of a deployment.
    Invalidate(DeploymentArgs),
    /// Print the remaining lifetime of a deployment's cached responses.
    Ttl(DeploymentArgs),
}

#[derive(Debug, Args, Clone)]
pub struct DeploymentArgs {
    /// Deployment key the command applies to.
    #[arg(value_name = "DEPLOYMENT_KEY")]
    pub deployment_key: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the full Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the Redis host.
    #[arg(long = "redis-host", value_name = "HOST", global = true)]
    pub redis_host: Option<String>,

    /// Override the Redis port.
    #[arg(long = "redis-port", value_name = "PORT", global = true)]
    pub redis_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` when no Redis endpoint is configured; the stores run disabled.
    pub redis: Option<RedisSettings>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Url,
    pub cache_db: u32,
    pub metrics_db: u32,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_environment(cli, Environment::with_prefix(ENV_PREFIX))
}

fn load_with_environment(cli: &CliArgs, environment: Environment) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(environment.separator("__").try_parsing(true));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    redis: RawRedisSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(host) = overrides.redis_host.as_ref() {
            self.redis.host = Some(host.clone());
        }
        if let Some(port) = overrides.redis_port {
            self.redis.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { redis, logging } = raw;

        let redis = build_redis_settings(redis)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self { redis, logging })
    }
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<Option<RedisSettings>, LoadError> {
    let url = match (non_blank(redis.url), non_blank(redis.host)) {
        (Some(url), _) => parse_redis_url(&url)?,
        (None, Some(host)) => {
            let port = redis.port.unwrap_or(DEFAULT_REDIS_PORT);
            if port == 0 {
                return Err(LoadError::invalid(
                    "redis.port",
                    "port must be greater than zero",
                ));
            }
            let mut url = parse_redis_url(&format!("redis://{host}:{port}"))?;
            if let Some(password) = non_blank(redis.password) {
                url.set_password(Some(&password)).map_err(|_| {
                    LoadError::invalid("redis.password", "cannot be applied to the connection url")
                })?;
            }
            url
        }
        (None, None) => return Ok(None),
    };

    let cache_db = redis.cache_db.unwrap_or(DEFAULT_CACHE_DB);
    let metrics_db = redis.metrics_db.unwrap_or(DEFAULT_METRICS_DB);
    if cache_db == metrics_db {
        return Err(LoadError::invalid(
            "redis.metrics_db",
            "cache and metrics must use different databases",
        ));
    }

    Ok(Some(RedisSettings {
        url,
        cache_db,
        metrics_db,
    }))
}

fn parse_redis_url(value: &str) -> Result<Url, LoadError> {
    let url = Url::parse(value)
        .map_err(|err| LoadError::invalid("redis.url", format!("failed to parse: {err}")))?;
    if url.scheme() != "redis" {
        return Err(LoadError::invalid(
            "redis.url",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LoadError::invalid("redis.url", "host must not be empty"));
    }
    Ok(url)
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    cache_db: Option<u32>,
    metrics_db: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
