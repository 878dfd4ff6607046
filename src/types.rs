use serde::Deserialize;
use serde_json::{Map, Value};

use logreader::filters::{CHANNEL, DATE_FROM, DATE_TO, LEVEL};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetLogsQuery {
	pub query: Option<String>,
	pub level: Option<String>,
	pub channel: Option<String>,
	pub date_from: Option<String>,
	pub date_to: Option<String>,
}

impl GetLogsQuery {
	/// Query parameters in the filter shape the tool input uses.
	pub fn filters(&self) -> Value {
		let mut map = Map::new();
		let fields = [
			(LEVEL, &self.level),
			(CHANNEL, &self.channel),
			(DATE_FROM, &self.date_from),
			(DATE_TO, &self.date_to),
		];
		for (key, value) in fields {
			if let Some(value) = value {
				map.insert(key.to_string(), Value::String(value.clone()));
			}
		}
		Value::Object(map)
	}
}
