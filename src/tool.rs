use logreader::{LogRecord, ValidationError};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ToolConfig;
use crate::reader::{LogReader, ReaderError};

pub const SERVER_NAME: &str = "Log Reader Server";
pub const SERVER_INSTRUCTIONS: &str = "This server allows AI agents to read and analyze application log data.";

const QUERY: &str = "query";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
	pub is_error: bool,
	pub text: String,
	pub records: Vec<LogRecord>,
	pub count: usize,
}

impl ToolResponse {
	pub fn success(records: Vec<LogRecord>) -> Self {
		let listing = serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string());
		ToolResponse {
			is_error: false,
			text: format!("Here is the log data you requested:\n\n{}", listing),
			count: records.len(),
			records,
		}
	}

	pub fn error(err: &ReaderError) -> Self {
		ToolResponse {
			is_error: true,
			text: err.public_message(),
			records: Vec::new(),
			count: 0,
		}
	}
}

/// The request surface an agent calls: metadata, input schema and the
/// handler that turns a JSON input into a response envelope.
#[derive(Debug, Clone)]
pub struct LogReaderTool {
	config: ToolConfig,
}

impl LogReaderTool {
	pub fn new(config: ToolConfig) -> Self {
		LogReaderTool { config }
	}

	pub fn should_register(&self) -> bool {
		self.config.enabled
	}

	pub fn name(&self) -> &str {
		&self.config.name
	}

	pub fn title(&self) -> &str {
		&self.config.title
	}

	pub fn description(&self) -> &str {
		&self.config.description
	}

	pub fn input_schema(&self) -> Value {
		json!({
			"type": "object",
			"properties": {
				"query": {
					"type": ["string", "null"],
					"description": "Free text search in logs."
				},
				"filters": {
					"type": ["object", "null"],
					"description": "Filters to narrow down the log entries.",
					"properties": {
						"level": {
							"type": ["string", "null"],
							"description": "Log level (e.g. info, error, debug)."
						},
						"date_from": {
							"type": ["string", "null"],
							"description": "Start date (YYYY-MM-DD)."
						},
						"date_to": {
							"type": ["string", "null"],
							"description": "End date (YYYY-MM-DD)."
						},
						"channel": {
							"type": ["string", "null"],
							"description": "Log channel."
						}
					}
				}
			}
		})
	}

	pub fn metadata(&self) -> Value {
		json!({
			"name": self.name(),
			"title": self.title(),
			"description": self.description(),
			"inputSchema": self.input_schema(),
		})
	}

	pub fn handle(&self, reader: &LogReader, input: &Value) -> ToolResponse {
		let result = parse_input(input)
			.map_err(ReaderError::from)
			.and_then(|(query, filters)| reader.query(query, filters));
		match result {
			Ok(records) => {
				log::info!("{} returned {} records", self.name(), records.len());
				ToolResponse::success(records)
			}
			Err(err) => {
				log::warn!("{} failed: {}", self.name(), err);
				ToolResponse::error(&err)
			}
		}
	}
}

/// Splits tool input into the search term and the raw filters.
pub fn parse_input(input: &Value) -> Result<(&str, Option<&Value>), ValidationError> {
	let map = match input {
		Value::Null => return Ok(("", None)),
		Value::Object(map) => map,
		_ => return Err(ValidationError::new("input", "must be an object")),
	};
	let query = match map.get(QUERY) {
		None | Some(Value::Null) => "",
		Some(Value::String(query)) => query.as_str(),
		Some(_) => return Err(ValidationError::new(QUERY, "must be a string")),
	};
	Ok((query, map.get(logreader::filters::FILTERS)))
}

pub fn server_info(tool: &LogReaderTool) -> Value {
	let tools = if tool.should_register() {
		vec![tool.metadata()]
	} else {
		Vec::new()
	};
	json!({
		"name": SERVER_NAME,
		"instructions": SERVER_INSTRUCTIONS,
		"tools": tools,
	})
}
