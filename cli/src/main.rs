use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use logreader::filters::{CHANNEL, DATE_FROM, DATE_TO, LEVEL};
use logreader_server::config::{config_path, log_level, ReaderConfig};
use logreader_server::reader::LogReader;
use logreader_server::tool::LogReaderTool;
use serde_json::{Map, Value};
use simple_logger::SimpleLogger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[command(subcommand)]
	subcommand: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Search the configured log source
	Query {
		/// Free text search term
		#[arg(long, default_value = "")]
		query: String,
		#[arg(long)]
		level: Option<String>,
		#[arg(long)]
		channel: Option<String>,
		#[arg(long)]
		date_from: Option<String>,
		#[arg(long)]
		date_to: Option<String>,
		/// JSON config file, overrides LOG_READER_CONFIG
		#[arg(long)]
		config: Option<PathBuf>,
	},
	/// Print the tool metadata and input schema
	Schema {
		#[arg(long)]
		config: Option<PathBuf>,
	},
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ReaderConfig> {
	let path = path.or_else(config_path);
	Ok(ReaderConfig::from_sources(path.as_deref(), |key| std::env::var(key).ok())?)
}

fn filters(fields: [(&str, Option<String>); 4]) -> Value {
	let mut map = Map::new();
	for (key, value) in fields {
		if let Some(value) = value {
			map.insert(key.to_string(), Value::String(value));
		}
	}
	Value::Object(map)
}

fn run(cli: Cli) -> anyhow::Result<bool> {
	match cli.subcommand {
		Commands::Query {
			query,
			level,
			channel,
			date_from,
			date_to,
			config,
		} => {
			let config = load_config(config)?;
			let reader = LogReader::from_config(&config)?;
			let filters = filters([(LEVEL, level), (CHANNEL, channel), (DATE_FROM, date_from), (DATE_TO, date_to)]);
			match reader.query(&query, Some(&filters)) {
				Ok(records) => {
					println!("{}", serde_json::to_string_pretty(&records)?);
					log::info!("{} records", records.len());
					Ok(true)
				}
				Err(err) => {
					eprintln!("{}", err.public_message());
					Ok(false)
				}
			}
		}
		Commands::Schema { config } => {
			let config = load_config(config)?;
			let tool = LogReaderTool::new(config.tool);
			println!("{}", serde_json::to_string_pretty(&tool.metadata())?);
			Ok(true)
		}
	}
}

fn main() -> ExitCode {
	SimpleLogger::new().with_level(log_level()).init().ok();
	match run(Cli::parse()) {
		Ok(true) => ExitCode::SUCCESS,
		Ok(false) => ExitCode::FAILURE,
		Err(err) => {
			eprintln!("{:#}", err);
			ExitCode::FAILURE
		}
	}
}
