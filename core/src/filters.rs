use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

pub const FILTERS: &str = "filters";
pub const LEVEL: &str = "level";
pub const CHANNEL: &str = "channel";
pub const DATE_FROM: &str = "date_from";
pub const DATE_TO: &str = "date_to";

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Canonical filters. Dates are whole calendar days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
	pub level: Option<String>,
	pub channel: Option<String>,
	pub date_from: Option<NaiveDate>,
	pub date_to: Option<NaiveDate>,
}

impl FilterSet {
	pub fn is_empty(&self) -> bool {
		self.level.is_none() && self.channel.is_none() && self.date_from.is_none() && self.date_to.is_none()
	}

	/// Inclusive on both ends.
	pub fn includes_day(&self, day: NaiveDate) -> bool {
		if let Some(from) = self.date_from {
			if day < from {
				return false;
			}
		}
		if let Some(to) = self.date_to {
			if day > to {
				return false;
			}
		}
		true
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
	pub field: String,
	pub reason: String,
}

impl ValidationError {
	pub fn new(field: &str, reason: &str) -> Self {
		Self {
			field: field.to_string(),
			reason: reason.to_string(),
		}
	}
}

/// Validates raw filter input against today's local date.
pub fn normalize(raw: Option<&Value>) -> Result<FilterSet, ValidationError> {
	normalize_on(raw, Local::now().date_naive())
}

/// Same as [`normalize`] with an explicit "today" for the relative date
/// keywords. Unknown keys are ignored; `null` values count as absent.
pub fn normalize_on(raw: Option<&Value>, today: NaiveDate) -> Result<FilterSet, ValidationError> {
	let map = match raw {
		None | Some(Value::Null) => return Ok(FilterSet::default()),
		Some(Value::Object(map)) => map,
		Some(_) => return Err(ValidationError::new(FILTERS, "must be an object")),
	};
	let filters = FilterSet {
		level: text_filter(map, LEVEL)?,
		channel: text_filter(map, CHANNEL)?,
		date_from: date_filter(map, DATE_FROM, today)?,
		date_to: date_filter(map, DATE_TO, today)?,
	};
	if let (Some(from), Some(to)) = (filters.date_from, filters.date_to) {
		if to < from {
			return Err(ValidationError::new(DATE_TO, "date_to before date_from"));
		}
	}
	Ok(filters)
}

fn text_filter(map: &Map<String, Value>, field: &str) -> Result<Option<String>, ValidationError> {
	match map.get(field) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(value)) => {
			let value = value.trim();
			if value.is_empty() {
				return Err(ValidationError::new(field, "must be a non-empty string"));
			}
			Ok(Some(value.to_string()))
		}
		Some(_) => Err(ValidationError::new(field, "must be a non-empty string")),
	}
}

fn date_filter(map: &Map<String, Value>, field: &str, today: NaiveDate) -> Result<Option<NaiveDate>, ValidationError> {
	match map.get(field) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(value)) => match parse_date(value, today) {
			Some(day) => Ok(Some(day)),
			None => Err(ValidationError::new(field, "invalid date")),
		},
		Some(_) => Err(ValidationError::new(field, "invalid date")),
	}
}

/// Accepts ISO dates, ISO date-times (the time of day is dropped) and the
/// keywords `today`, `yesterday`, `tomorrow` and `now`.
pub fn parse_date(value: &str, today: NaiveDate) -> Option<NaiveDate> {
	let value = value.trim();
	match value.to_ascii_lowercase().as_str() {
		"today" | "now" => return Some(today),
		"yesterday" => return today.checked_sub_days(Days::new(1)),
		"tomorrow" => return today.checked_add_days(Days::new(1)),
		_ => {}
	}
	if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
		return Some(day);
	}
	if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
		return Some(ts.date_naive());
	}
	DATE_TIME_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
		.map(|ts| ts.date())
}
