use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::logline::LogLine;

/// Timestamp layouts accepted from log files and database columns.
const TIMESTAMP_FORMATS: &[&str] = &[
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%dT%H:%M:%S%.f",
	"%Y-%m-%d %H:%M",
	"%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordId {
	Int(i64),
	Text(String),
}

impl RecordId {
	pub fn parse(value: &str) -> Self {
		match value.trim().parse::<i64>() {
			Ok(id) => RecordId::Int(id),
			Err(_) => RecordId::Text(value.to_string()),
		}
	}
}

/// Canonical log record returned by every driver.
///
/// `message` and `timestamp` are always set. Optional fields that the
/// source did not provide are left out of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<RecordId>,
	pub level: String,
	pub message: String,
	pub timestamp: NaiveDateTime,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub channel: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub context: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extra: Option<Value>,
}

/// A record as a driver read it, every field still in its stored text form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
	pub id: Option<String>,
	pub level: Option<String>,
	pub message: Option<String>,
	pub timestamp: Option<String>,
	pub channel: Option<String>,
	pub context: Option<String>,
	pub extra: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordError {
	#[error("record has no {0}")]
	MissingField(&'static str),
	#[error("unrecognized timestamp {0:?}")]
	InvalidTimestamp(String),
}

pub fn normalize_level(level: &str) -> String {
	level.trim().to_lowercase()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
	let value = value.trim();
	if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
		return Some(ts.naive_local());
	}
	for format in TIMESTAMP_FORMATS {
		if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
			return Some(ts);
		}
	}
	None
}

/// Serialized payloads become structured values; text that is not JSON is
/// kept as a JSON string rather than dropped.
pub fn parse_payload(value: &str) -> Value {
	match serde_json::from_str(value) {
		Ok(parsed) => parsed,
		Err(_) => Value::String(value.to_string()),
	}
}

pub fn normalize(raw: RawRecord) -> Result<LogRecord, RecordError> {
	let message = raw.message.ok_or(RecordError::MissingField("message"))?;
	let timestamp = raw.timestamp.ok_or(RecordError::MissingField("timestamp"))?;
	let timestamp = parse_timestamp(&timestamp).ok_or(RecordError::InvalidTimestamp(timestamp))?;
	Ok(LogRecord {
		id: raw.id.as_deref().map(RecordId::parse),
		level: raw.level.as_deref().map(normalize_level).unwrap_or_default(),
		message,
		timestamp,
		channel: raw.channel,
		context: raw.context.as_deref().map(parse_payload),
		extra: raw.extra.as_deref().map(parse_payload),
	})
}

impl From<LogLine> for LogRecord {
	fn from(line: LogLine) -> Self {
		LogRecord {
			id: None,
			level: normalize_level(&line.level),
			message: line.message,
			timestamp: line.timestamp,
			channel: Some(line.channel),
			context: None,
			extra: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use serde_json::json;

	fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
		NaiveDate::from_ymd_opt(2025, 9, 28).unwrap().and_hms_opt(h, m, s).unwrap()
	}

	#[test]
	fn normalizes_database_row() {
		let record = normalize(RawRecord {
			id: Some("7".into()),
			level: Some("ERROR".into()),
			message: Some("Payment failed".into()),
			timestamp: Some("2025-09-28 12:01:00".into()),
			channel: Some("payment".into()),
			context: Some(r#"{"order":42}"#.into()),
			extra: None,
		})
		.unwrap();
		assert_eq!(record.id, Some(RecordId::Int(7)));
		assert_eq!(record.level, "error");
		assert_eq!(record.timestamp, ts(12, 1, 0));
		assert_eq!(record.context, Some(json!({"order": 42})));
		assert_eq!(record.extra, None);
	}

	#[test]
	fn absent_fields_are_not_serialized() {
		let record = normalize(RawRecord {
			message: Some("hello".into()),
			timestamp: Some("2025-09-28T12:00:00".into()),
			..Default::default()
		})
		.unwrap();
		let value = serde_json::to_value(&record).unwrap();
		let obj = value.as_object().unwrap();
		assert!(!obj.contains_key("id"));
		assert!(!obj.contains_key("context"));
		assert!(!obj.contains_key("channel"));
		assert_eq!(obj["message"], "hello");
	}

	#[test]
	fn non_json_payload_is_kept_as_string() {
		assert_eq!(parse_payload("not json"), json!("not json"));
		assert_eq!(parse_payload("[1,2]"), json!([1, 2]));
	}

	#[test]
	fn text_ids_survive() {
		assert_eq!(RecordId::parse("abc-1"), RecordId::Text("abc-1".into()));
	}

	#[test]
	fn missing_message_is_an_error() {
		let err = normalize(RawRecord {
			timestamp: Some("2025-09-28 12:00:00".into()),
			..Default::default()
		})
		.unwrap_err();
		assert_eq!(err, RecordError::MissingField("message"));
	}

	#[test]
	fn bad_timestamp_is_an_error() {
		let err = normalize(RawRecord {
			message: Some("x".into()),
			timestamp: Some("yesterday-ish".into()),
			..Default::default()
		})
		.unwrap_err();
		assert!(matches!(err, RecordError::InvalidTimestamp(_)));
	}

	#[test]
	fn timestamp_formats() {
		assert_eq!(parse_timestamp("2025-09-28 12:00:00"), Some(ts(12, 0, 0)));
		assert_eq!(parse_timestamp("2025-09-28 12:00:00.250").map(|t| t.date()), Some(ts(0, 0, 0).date()));
		assert_eq!(parse_timestamp("2025-09-28T12:00:00+02:00"), Some(ts(12, 0, 0)));
		assert_eq!(parse_timestamp("2025-09-28T12:00:00.123456+00:00").map(|t| t.date()), Some(ts(0, 0, 0).date()));
		assert_eq!(parse_timestamp("28/09/2025"), None);
	}
}
