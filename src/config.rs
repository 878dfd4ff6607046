use std::path::{Path, PathBuf};
use std::str::FromStr;

use logreader::{DriverKind, FileDriverConfig};
use serde::Deserialize;

pub fn config_path() -> Option<PathBuf> {
	match std::env::var("LOG_READER_CONFIG") {
		Ok(val) if !val.trim().is_empty() => Some(Path::new(&val).to_owned()),
		_ => None,
	}
}

pub fn listen_addr() -> String {
	match std::env::var("LISTEN_ADDR") {
		Ok(val) => val,
		Err(_) => "0.0.0.0:3337".to_string(),
	}
}

pub fn log_level() -> log::LevelFilter {
	std::env::var("LOG_LEVEL")
		.ok()
		.and_then(|val| val.parse().ok())
		.unwrap_or(log::LevelFilter::Info)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("cannot read config file {}: {source}", .path.display())]
	Read { path: PathBuf, source: std::io::Error },
	#[error("malformed config: {0}")]
	Parse(#[from] serde_json::Error),
	#[error("invalid value for {key}: {value:?}")]
	InvalidEnv { key: String, value: String },
	#[error("{0}")]
	UnknownDriver(String),
	#[error("{0} must be greater than zero")]
	Zero(&'static str),
	#[error("column mapping for {0} is required")]
	MissingColumn(&'static str),
	#[error("{0:?} is not a valid SQL identifier")]
	InvalidIdentifier(String),
	#[error("searchable column {0} has no column mapping")]
	UnmappedSearchable(LogicalColumn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalColumn {
	Id,
	Level,
	Message,
	Timestamp,
	Channel,
	Context,
	Extra,
}

impl std::fmt::Display for LogicalColumn {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			LogicalColumn::Id => "id",
			LogicalColumn::Level => "level",
			LogicalColumn::Message => "message",
			LogicalColumn::Timestamp => "timestamp",
			LogicalColumn::Channel => "channel",
			LogicalColumn::Context => "context",
			LogicalColumn::Extra => "extra",
		};
		write!(f, "{}", name)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
	Text,
	Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchableColumn {
	#[serde(alias = "name")]
	pub column: LogicalColumn,
	#[serde(alias = "type")]
	pub kind: ColumnKind,
}

/// Logical to physical column names. `null` disables an optional column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnMapping {
	#[serde(default = "default_id_column")]
	pub id: Option<String>,
	#[serde(default = "default_level_column")]
	pub level: Option<String>,
	#[serde(default = "default_message_column")]
	pub message: Option<String>,
	#[serde(default = "default_timestamp_column")]
	pub timestamp: Option<String>,
	#[serde(default = "default_channel_column")]
	pub channel: Option<String>,
	#[serde(default = "default_context_column")]
	pub context: Option<String>,
	#[serde(default = "default_extra_column")]
	pub extra: Option<String>,
}

fn default_id_column() -> Option<String> { Some("id".to_string()) }
fn default_level_column() -> Option<String> { Some("level".to_string()) }
fn default_message_column() -> Option<String> { Some("message".to_string()) }
fn default_timestamp_column() -> Option<String> { Some("created_at".to_string()) }
fn default_channel_column() -> Option<String> { Some("channel".to_string()) }
fn default_context_column() -> Option<String> { Some("context".to_string()) }
fn default_extra_column() -> Option<String> { Some("extra".to_string()) }

impl Default for ColumnMapping {
	fn default() -> Self {
		Self {
			id: default_id_column(),
			level: default_level_column(),
			message: default_message_column(),
			timestamp: default_timestamp_column(),
			channel: default_channel_column(),
			context: default_context_column(),
			extra: default_extra_column(),
		}
	}
}

impl ColumnMapping {
	pub fn physical(&self, column: LogicalColumn) -> Option<&str> {
		let name = match column {
			LogicalColumn::Id => &self.id,
			LogicalColumn::Level => &self.level,
			LogicalColumn::Message => &self.message,
			LogicalColumn::Timestamp => &self.timestamp,
			LogicalColumn::Channel => &self.channel,
			LogicalColumn::Context => &self.context,
			LogicalColumn::Extra => &self.extra,
		};
		name.as_deref().map(str::trim).filter(|name| !name.is_empty())
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.physical(LogicalColumn::Message).is_none() {
			return Err(ConfigError::MissingColumn("message"));
		}
		if self.physical(LogicalColumn::Timestamp).is_none() {
			return Err(ConfigError::MissingColumn("timestamp"));
		}
		for column in ALL_COLUMNS {
			if let Some(name) = self.physical(column) {
				if !is_identifier(name) {
					return Err(ConfigError::InvalidIdentifier(name.to_string()));
				}
			}
		}
		Ok(())
	}
}

const ALL_COLUMNS: [LogicalColumn; 7] = [
	LogicalColumn::Id,
	LogicalColumn::Level,
	LogicalColumn::Message,
	LogicalColumn::Timestamp,
	LogicalColumn::Channel,
	LogicalColumn::Context,
	LogicalColumn::Extra,
];

pub fn is_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A table name, optionally qualified by one schema name.
pub fn is_table_name(name: &str) -> bool {
	let mut parts = name.split('.');
	let valid = parts.by_ref().take(2).all(is_identifier);
	valid && parts.next().is_none()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
	pub path: PathBuf,
	pub limit: usize,
	pub chunk_size: usize,
}

impl Default for FileConfig {
	fn default() -> Self {
		Self {
			path: PathBuf::from("./storage/logs/laravel.log"),
			limit: 10_000,
			chunk_size: 64 * 1024,
		}
	}
}

impl FileConfig {
	pub fn driver_config(&self) -> FileDriverConfig {
		FileDriverConfig {
			path: self.path.clone(),
			chunk_size: self.chunk_size,
			limit: self.limit,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
	pub table: String,
	pub connection: String,
	pub limit: usize,
	pub chunk_size: usize,
	/// How long a query waits for a pooled connection.
	pub connection_timeout_ms: u64,
	pub columns: ColumnMapping,
	pub searchable_columns: Vec<SearchableColumn>,
}

impl Default for DbConfig {
	fn default() -> Self {
		Self {
			table: "logs".to_string(),
			connection: "./logs.sqlite".to_string(),
			limit: 10_000,
			chunk_size: 500,
			connection_timeout_ms: 5_000,
			columns: ColumnMapping::default(),
			searchable_columns: vec![
				SearchableColumn { column: LogicalColumn::Message, kind: ColumnKind::Text },
				SearchableColumn { column: LogicalColumn::Context, kind: ColumnKind::Json },
				SearchableColumn { column: LogicalColumn::Extra, kind: ColumnKind::Json },
			],
		}
	}
}

impl DbConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !is_table_name(self.table.trim()) {
			return Err(ConfigError::InvalidIdentifier(self.table.clone()));
		}
		if self.limit == 0 {
			return Err(ConfigError::Zero("db.limit"));
		}
		if self.chunk_size == 0 {
			return Err(ConfigError::Zero("db.chunk_size"));
		}
		self.columns.validate()?;
		for searchable in &self.searchable_columns {
			if self.columns.physical(searchable.column).is_none() {
				return Err(ConfigError::UnmappedSearchable(searchable.column));
			}
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
	pub enabled: bool,
	pub name: String,
	pub title: String,
	pub description: String,
}

impl Default for ToolConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			name: "log-reader".to_string(),
			title: "Log Reader Tool".to_string(),
			description: "A tool to read and analyze application log data via MCP.".to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
	pub driver: String,
	pub file: FileConfig,
	pub db: DbConfig,
	pub tool: ToolConfig,
}

impl Default for ReaderConfig {
	fn default() -> Self {
		Self {
			driver: "file".to_string(),
			file: FileConfig::default(),
			db: DbConfig::default(),
			tool: ToolConfig::default(),
		}
	}
}

impl ReaderConfig {
	/// Defaults, then the file named by `LOG_READER_CONFIG`, then the
	/// environment.
	pub fn load() -> Result<Self, ConfigError> {
		Self::from_sources(config_path().as_deref(), |key| std::env::var(key).ok())
	}

	pub fn from_sources(file: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut config = match file {
			Some(path) => {
				let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
					path: path.to_owned(),
					source,
				})?;
				Self::from_json(&text)?
			}
			None => Self::default(),
		};
		config.apply_env(env)?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_json(text: &str) -> Result<Self, ConfigError> {
		Ok(serde_json::from_str(text)?)
	}

	fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
		if let Some(driver) = env("LOG_READER_DRIVER") {
			self.driver = driver;
		}
		if let Some(path) = env("LOG_FILE_PATH") {
			self.file.path = PathBuf::from(path);
		}
		if let Some(limit) = parse_env(&env, "LOG_READER_FILE_QUERY_LIMIT")? {
			self.file.limit = limit;
		}
		if let Some(chunk_size) = parse_env(&env, "LOG_READER_FILE_CHUNK_SIZE")? {
			self.file.chunk_size = chunk_size;
		}
		if let Some(table) = env("LOG_DB_TABLE_NAME") {
			self.db.table = table;
		}
		if let Some(connection) = env("LOG_DB_CONNECTION") {
			self.db.connection = connection;
		}
		if let Some(limit) = parse_env(&env, "LOG_READER_DB_QUERY_LIMIT")? {
			self.db.limit = limit;
		}
		if let Some(chunk_size) = parse_env(&env, "LOG_READER_DB_CHUNK_SIZE")? {
			self.db.chunk_size = chunk_size;
		}
		if let Some(value) = env("MCP_LOG_READER_ENABLED") {
			self.tool.enabled = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
				key: "MCP_LOG_READER_ENABLED".to_string(),
				value,
			})?;
		}
		if let Some(name) = env("MCP_LOG_READER_TOOL_NAME") {
			self.tool.name = name;
		}
		if let Some(title) = env("MCP_LOG_READER_TOOL_TITLE") {
			self.tool.title = title;
		}
		if let Some(description) = env("MCP_LOG_READER_TOOL_DESCRIPTION") {
			self.tool.description = description;
		}
		Ok(())
	}

	pub fn driver_kind(&self) -> Result<DriverKind, ConfigError> {
		self.driver.parse().map_err(ConfigError::UnknownDriver)
	}

	/// Checks the section of the selected driver; the other one is unused.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match self.driver_kind()? {
			DriverKind::File => {
				if self.file.limit == 0 {
					return Err(ConfigError::Zero("file.limit"));
				}
				if self.file.chunk_size == 0 {
					return Err(ConfigError::Zero("file.chunk_size"));
				}
				Ok(())
			}
			DriverKind::Db => self.db.validate(),
		}
	}
}

fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError> {
	match env(key) {
		Some(value) => match value.trim().parse() {
			Ok(parsed) => Ok(Some(parsed)),
			Err(_) => Err(ConfigError::InvalidEnv {
				key: key.to_string(),
				value,
			}),
		},
		None => Ok(None),
	}
}

fn parse_bool(value: &str) -> Option<bool> {
	match value.trim().to_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" | "" => Some(false),
		_ => None,
	}
}
