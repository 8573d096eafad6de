//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "stampa";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ENGINE_WORKERS: u32 = 4;
const DEFAULT_ENGINE_QUEUE_CAPACITY: u32 = 64;
const DEFAULT_ENGINE_PROCESSING_DEADLINE_SECS: u64 = 120;
const DEFAULT_ENGINE_REAPER_INTERVAL_SECS: u64 = 30;
const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_CONVERTER_PATH: &str = "stampa-convert";
const DEFAULT_SCRATCH_DIR: &str = "/tmp/stampa-render";

/// Command-line arguments for the Stampa binary.
#[derive(Debug, Parser)]
#[command(name = "stampa", version, about = "Stampa render job engine")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "STAMPA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the render job HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the number of render workers.
    #[arg(long = "engine-workers", value_name = "COUNT")]
    pub engine_workers: Option<u32>,

    /// Override the pending-job queue capacity.
    #[arg(long = "engine-queue-capacity", value_name = "COUNT")]
    pub engine_queue_capacity: Option<u32>,

    /// Override the per-job processing deadline.
    #[arg(long = "engine-processing-deadline-seconds", value_name = "SECONDS")]
    pub engine_processing_deadline_seconds: Option<u64>,

    /// Override the stuck-job reaper cadence.
    #[arg(long = "engine-reaper-interval-seconds", value_name = "SECONDS")]
    pub engine_reaper_interval_seconds: Option<u64>,

    /// Override the converter executable invoked per job.
    #[arg(long = "renderer-converter-path", value_name = "PATH")]
    pub renderer_converter_path: Option<PathBuf>,

    /// Override the scratch directory used to stage render inputs.
    #[arg(long = "renderer-scratch-dir", value_name = "PATH")]
    pub renderer_scratch_dir: Option<PathBuf>,

    /// Override the artifact storage directory.
    #[arg(long = "artifacts-directory", value_name = "PATH")]
    pub artifacts_directory: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub engine: EngineSettings,
    pub renderer: RendererSettings,
    pub artifacts: ArtifactSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub workers: NonZeroU32,
    pub queue_capacity: NonZeroU32,
    pub processing_deadline: Duration,
    pub reaper_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub converter_path: PathBuf,
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArtifactSettings {
    pub directory: PathBuf,
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
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("STAMPA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    engine: RawEngineSettings,
    renderer: RawRendererSettings,
    artifacts: RawArtifactSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(workers) = overrides.engine_workers {
            self.engine.workers = Some(workers);
        }
        if let Some(capacity) = overrides.engine_queue_capacity {
            self.engine.queue_capacity = Some(capacity);
        }
        if let Some(seconds) = overrides.engine_processing_deadline_seconds {
            self.engine.processing_deadline_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.engine_reaper_interval_seconds {
            self.engine.reaper_interval_seconds = Some(seconds);
        }
        if let Some(path) = overrides.renderer_converter_path.as_ref() {
            self.renderer.converter_path = Some(path.clone());
        }
        if let Some(path) = overrides.renderer_scratch_dir.as_ref() {
            self.renderer.scratch_dir = Some(path.clone());
        }
        if let Some(path) = overrides.artifacts_directory.as_ref() {
            self.artifacts.directory = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            engine,
            renderer,
            artifacts,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let engine = build_engine_settings(engine)?;
        let renderer = build_renderer_settings(renderer)?;
        let artifacts = build_artifact_settings(artifacts);

        Ok(Self {
            server,
            logging,
            engine,
            renderer,
            artifacts,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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

fn build_engine_settings(engine: RawEngineSettings) -> Result<EngineSettings, LoadError> {
    let workers = engine.workers.unwrap_or(DEFAULT_ENGINE_WORKERS);
    let queue_capacity = engine
        .queue_capacity
        .unwrap_or(DEFAULT_ENGINE_QUEUE_CAPACITY);

    let deadline_secs = engine
        .processing_deadline_seconds
        .unwrap_or(DEFAULT_ENGINE_PROCESSING_DEADLINE_SECS);
    if deadline_secs == 0 {
        return Err(LoadError::invalid(
            "engine.processing_deadline_seconds",
            "must be greater than zero",
        ));
    }

    let reaper_secs = engine
        .reaper_interval_seconds
        .unwrap_or(DEFAULT_ENGINE_REAPER_INTERVAL_SECS);
    if reaper_secs == 0 {
        return Err(LoadError::invalid(
            "engine.reaper_interval_seconds",
            "must be greater than zero",
        ));
    }

    Ok(EngineSettings {
        workers: non_zero_u32(workers.into(), "engine.workers")?,
        queue_capacity: non_zero_u32(queue_capacity.into(), "engine.queue_capacity")?,
        processing_deadline: Duration::from_secs(deadline_secs),
        reaper_interval: Duration::from_secs(reaper_secs),
    })
}

fn build_renderer_settings(renderer: RawRendererSettings) -> Result<RendererSettings, LoadError> {
    let converter_path = renderer
        .converter_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONVERTER_PATH));
    if converter_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "renderer.converter_path",
            "path must not be empty",
        ));
    }

    let scratch_dir = renderer
        .scratch_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR));
    if scratch_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "renderer.scratch_dir",
            "path must not be empty",
        ));
    }

    Ok(RendererSettings {
        converter_path,
        scratch_dir,
    })
}

fn build_artifact_settings(artifacts: RawArtifactSettings) -> ArtifactSettings {
    ArtifactSettings {
        directory: artifacts
            .directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEngineSettings {
    workers: Option<u32>,
    queue_capacity: Option<u32>,
    processing_deadline_seconds: Option<u64>,
    reaper_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRendererSettings {
    converter_path: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawArtifactSettings {
    directory: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
