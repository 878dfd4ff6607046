use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::record::parse_timestamp;

// [2025-09-28 12:00:00] local.ERROR: Payment failed {"order":42}
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\[(?P<ts>[^\]]+)\]\s+(?P<channel>\S+?)\.(?P<level>[A-Za-z]+):\s*(?P<message>.*)$")
		.expect("header pattern compiles")
});

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
	pub timestamp: NaiveDateTime,
	pub channel: String,
	pub level: String,
	pub message: String,
}

/// Parses one log file line. Stack trace continuations, blank lines and
/// anything else without a recognizable header yield `None`.
pub fn parse_line(line: &str) -> Option<LogLine> {
	let line = line.trim_end_matches(['\r', '\n']);
	let caps = HEADER.captures(line)?;
	let timestamp = parse_timestamp(&caps["ts"])?;
	Some(LogLine {
		timestamp,
		channel: caps["channel"].to_string(),
		level: caps["level"].to_string(),
		message: caps["message"].to_string(),
	})
}
