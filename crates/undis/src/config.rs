//! Configuration for the undis proxy
//!
//! Values come from defaults, then an optional configuration file (TOML,
//! JSON or YAML), then command-line flags. The result is validated once and
//! published read-only through [`SERVER_CONF`].
//!
//! # Example
//!
//! ```no_run
//! use undis::config::{Cli, Parser, setup};
//!
//! let args = Cli::parse();
//! setup(args)?;
//!
//! let backend = &undis::server_config!(backend_addr);
//! println!("Forwarding to {}", backend);
//! # Ok::<(), undis::config::ConfigError>(())
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use arc_swap::ArcSwap;
pub use clap::Parser;
use resp::CommandTable;
use resp::ParserLimits;
use serde::Deserialize;
use serde::Serialize;
use telemetry::TelemetryError;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "conf/undis.toml";

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to read configuration file '{path}': {source}")]
	Io {
		source: std::io::Error,
		path: String,
	},

	#[error("Failed to parse TOML configuration: {0}")]
	TomlParse(#[from] toml::de::Error),

	#[error("Failed to parse JSON configuration: {0}")]
	JsonParse(#[from] serde_json::Error),

	#[error("Failed to parse YAML configuration: {0}")]
	YamlParse(#[from] serde_yaml::Error),

	#[error("Unsupported configuration format: {0}")]
	UnsupportedFormat(String),

	#[error("Configuration file has no extension")]
	NoExtension,

	#[error("Invalid value for '{field}': {reason}")]
	InvalidValue { field: &'static str, reason: String },

	#[error(transparent)]
	Telemetry(#[from] TelemetryError),
}

/// Command-line arguments for the proxy
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	/// Configuration file path (TOML, JSON, or YAML).
	/// Defaults to conf/undis.toml if it exists.
	#[arg(short, long)]
	pub config: Option<String>,

	/// Address to accept clients on (host:port)
	#[arg(long)]
	pub listen: Option<String>,

	/// Backend server address (host:port)
	#[arg(long)]
	pub backend: Option<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	/// Close a client that sends nothing for this many seconds (0 disables)
	#[arg(long)]
	pub idle_timeout: Option<u64>,

	/// Number of worker threads (default: number of CPU cores)
	#[arg(long)]
	pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
	pub listen_addr: String,
	pub backend_addr: String,
	pub log_level: String,
	pub worker_threads: usize,
	pub connect_timeout_secs: u64,
	pub idle_timeout_secs: u64,
	pub max_bulk_len: usize,
	pub max_multibulk_len: usize,
	pub max_inline_len: usize,
	/// Extra command names that use bulk-style inline framing
	pub inline_bulk_commands: Vec<String>,
}

impl Default for ServerConfig {
	fn default() -> Self {
		let limits = ParserLimits::default();
		Self {
			listen_addr: "127.0.0.1:6378".into(),
			backend_addr: "127.0.0.1:6379".into(),
			log_level: "info".into(),
			worker_threads: num_cpus::get(),
			connect_timeout_secs: 5,
			idle_timeout_secs: 0,
			max_bulk_len: limits.max_bulk_len,
			max_multibulk_len: limits.max_multibulk_len,
			max_inline_len: limits.max_inline_len,
			inline_bulk_commands: Vec::new(),
		}
	}
}

impl ServerConfig {
	pub fn parser_limits(&self) -> ParserLimits {
		ParserLimits {
			max_bulk_len: self.max_bulk_len,
			max_multibulk_len: self.max_multibulk_len,
			max_inline_len: self.max_inline_len,
		}
	}

	/// The inline command table; the shared built-in one unless extra
	/// names are configured.
	pub fn command_table(&self) -> Arc<CommandTable> {
		if self.inline_bulk_commands.is_empty() {
			CommandTable::legacy()
		} else {
			Arc::new(CommandTable::with_extra(&self.inline_bulk_commands))
		}
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn idle_timeout(&self) -> Option<Duration> {
		(self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
	}

	/// Check values that would otherwise fail late, at bind or first use.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.listen_addr.is_empty() {
			return Err(invalid("listen_addr", "must not be empty"));
		}
		if self.backend_addr.is_empty() {
			return Err(invalid("backend_addr", "must not be empty"));
		}
		if self.worker_threads == 0 {
			return Err(invalid("worker_threads", "must be at least 1"));
		}
		if self.connect_timeout_secs == 0 {
			return Err(invalid("connect_timeout_secs", "must be at least 1"));
		}
		for (field, value) in [
			("max_bulk_len", self.max_bulk_len),
			("max_multibulk_len", self.max_multibulk_len),
			("max_inline_len", self.max_inline_len),
		] {
			if value == 0 {
				return Err(invalid(field, "must be greater than 0"));
			}
		}
		if let Some(name) = self.inline_bulk_commands.iter().find(|n| n.is_empty() || n.contains(' ')) {
			return Err(ConfigError::InvalidValue {
				field: "inline_bulk_commands",
				reason: format!("'{}' is not a command name", name),
			});
		}
		telemetry::validate_level(&self.log_level)?;
		Ok(())
	}
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
	ConfigError::InvalidValue {
		field,
		reason: reason.to_string(),
	}
}

pub struct GlobalConfig {
	inner: OnceLock<ArcSwap<ServerConfig>>,
}

impl GlobalConfig {
	pub const fn new() -> Self {
		Self {
			inner: OnceLock::new(),
		}
	}

	/// Publish the configuration. Only the first call has an effect.
	pub fn init(&self, config: ServerConfig) {
		let _ = self.inner.set(ArcSwap::from_pointee(config));
	}

	/// Current configuration; defaults if `init` was never called.
	pub fn load(&self) -> arc_swap::Guard<Arc<ServerConfig>> {
		self.inner
			.get_or_init(|| ArcSwap::from_pointee(ServerConfig::default()))
			.load()
	}
}

impl Default for GlobalConfig {
	fn default() -> Self {
		Self::new()
	}
}

pub static SERVER_CONF: GlobalConfig = GlobalConfig::new();

/// Helper macro to access server configuration fields
///
/// Usage:
/// - For Copy types (numbers): `let n = server_config!(worker_threads);`
/// - For Borrowed types (Strings): `let s = &server_config!(backend_addr);`
#[macro_export]
macro_rules! server_config {
	($field:ident) => {
		$crate::config::SERVER_CONF.load().$field
	};
}

/// Resolve the configuration from file and flags, start logging and
/// publish the result.
pub fn setup(args: Cli) -> Result<(), ConfigError> {
	let config = load(args)?;
	telemetry::init(&config.log_level)?;
	SERVER_CONF.init(config);
	Ok(())
}

/// Resolve and validate the configuration without publishing it.
pub fn load(args: Cli) -> Result<ServerConfig, ConfigError> {
	let mut config = match args.config.as_deref() {
		Some(p) => load_from_file(p)?,
		None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH)?,
		None => ServerConfig::default(),
	};

	// Override with CLI arguments if explicitly provided
	if let Some(listen) = args.listen {
		config.listen_addr = listen;
	}
	if let Some(backend) = args.backend {
		config.backend_addr = backend;
	}
	if let Some(log_level) = args.log_level {
		config.log_level = log_level;
	}
	if let Some(secs) = args.idle_timeout {
		config.idle_timeout_secs = secs;
	}
	if let Some(t) = args.worker_threads {
		config.worker_threads = t;
	}

	config.validate()?;
	Ok(config)
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ServerConfig, ConfigError> {
	let path_ref = path.as_ref();
	let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
		path: path_ref.display().to_string(),
		source,
	})?;

	let extension = path_ref
		.extension()
		.and_then(|ext| ext.to_str())
		.ok_or(ConfigError::NoExtension)?;

	match extension.to_lowercase().as_str() {
		"toml" => Ok(toml::from_str(&content)?),
		"json" => Ok(serde_json::from_str(&content)?),
		"yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
		_ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
	}
}
