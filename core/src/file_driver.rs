use std::fs::File;
use std::path::PathBuf;

use crate::chunk_reader::ReverseChunkReader;
use crate::driver::{DriverError, DriverKind, LogDriver};
use crate::filters::FilterSet;
use crate::logline::{parse_line, LogLine};
use crate::query::QueryDescriptor;
use crate::record::LogRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct FileDriverConfig {
	pub path: PathBuf,
	/// Bytes per read.
	pub chunk_size: usize,
	pub limit: usize,
}

/// Reads a single log file newest line first.
#[derive(Debug, Clone)]
pub struct FileDriver {
	config: FileDriverConfig,
}

impl FileDriver {
	pub fn new(config: FileDriverConfig) -> Self {
		FileDriver { config }
	}

	pub fn config(&self) -> &FileDriverConfig {
		&self.config
	}

	/// Lazily yields matching records. Each call opens the file again, and
	/// the handle is closed as soon as the iterator is dropped.
	pub fn scan<'q>(
		&self,
		query: &'q QueryDescriptor,
	) -> Result<impl Iterator<Item = Result<LogRecord, DriverError>> + 'q, DriverError> {
		let path = self.config.path.clone();
		let file = File::open(&path).map_err(|err| DriverError::io(format!("cannot open {}: {}", path.display(), err)))?;
		let lines = ReverseChunkReader::new(file, self.config.chunk_size)
			.map_err(|err| DriverError::io(format!("cannot seek {}: {}", path.display(), err)))?;
		let search = query.search().map(str::to_lowercase);

		Ok(lines.filter_map(move |line| {
			let line = match line {
				Ok(line) => line,
				Err(err) => return Some(Err(DriverError::io(format!("read failed on {}: {}", path.display(), err)))),
			};
			let parsed = parse_line(&line)?;
			if !matches_filters(&parsed, query.filters()) {
				return None;
			}
			if let Some(term) = &search {
				if !parsed.message.to_lowercase().contains(term.as_str()) {
					return None;
				}
			}
			Some(Ok(LogRecord::from(parsed)))
		}))
	}
}

fn matches_filters(line: &LogLine, filters: &FilterSet) -> bool {
	if let Some(level) = &filters.level {
		if line.level.to_lowercase() != level.to_lowercase() {
			return false;
		}
	}
	if let Some(channel) = &filters.channel {
		if &line.channel != channel {
			return false;
		}
	}
	filters.includes_day(line.timestamp.date())
}

impl LogDriver for FileDriver {
	fn kind(&self) -> DriverKind {
		DriverKind::File
	}

	fn limit(&self) -> usize {
		self.config.limit
	}

	fn execute(&self, query: &QueryDescriptor) -> Result<Vec<LogRecord>, DriverError> {
		let records = self
			.scan(query)?
			.take(query.limit())
			.collect::<Result<Vec<_>, _>>()?;
		log::debug!("file driver matched {} records in {}", records.len(), self.config.path.display());
		Ok(records)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::DriverErrorKind;
	use crate::query::LogQuery;
	use chrono::NaiveDate;
	use std::io::Write;
	use tempfile::NamedTempFile;

	fn log_file(content: &str) -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file.flush().unwrap();
		file
	}

	fn driver(file: &NamedTempFile, limit: usize) -> FileDriver {
		FileDriver::new(FileDriverConfig {
			path: file.path().to_path_buf(),
			chunk_size: 32,
			limit,
		})
	}

	const TWO_LINES: &str = "[2025-09-28 12:00:00] local.INFO: First entry\n[2025-09-28 12:01:00] local.ERROR: Second entry {\"context\":\"failure\"}";

	#[test]
	fn returns_every_line_newest_first() {
		let file = log_file(TWO_LINES);
		let records = LogQuery::new(&driver(&file, 100)).execute().unwrap();
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].message, "Second entry {\"context\":\"failure\"}");
		assert_eq!(records[0].level, "error");
		assert_eq!(records[0].channel.as_deref(), Some("local"));
		assert_eq!(records[0].id, None);
		assert_eq!(records[1].message, "First entry");
	}

	#[test]
	fn search_matches_embedded_payload() {
		let file = log_file(TWO_LINES);
		let records = LogQuery::new(&driver(&file, 100)).search("FAILURE").execute().unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].message, "Second entry {\"context\":\"failure\"}");
	}

	#[test]
	fn level_filter_ignores_case() {
		let file = log_file(TWO_LINES);
		let filters = FilterSet {
			level: Some("Info".into()),
			..Default::default()
		};
		let records = LogQuery::new(&driver(&file, 100)).filter(filters).execute().unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].message, "First entry");
	}

	#[test]
	fn search_and_filters_must_both_match() {
		let file = log_file(TWO_LINES);
		let filters = FilterSet {
			level: Some("info".into()),
			..Default::default()
		};
		let records = LogQuery::new(&driver(&file, 100)).filter(filters).search("failure").execute().unwrap();
		assert!(records.is_empty());
	}

	#[test]
	fn channel_and_date_filters() {
		let file = log_file(
			"[2025-09-27 23:59:59] local.INFO: late\n[2025-09-28 00:00:00] production.INFO: early\n[2025-09-28 10:00:00] local.INFO: mid\n",
		);
		let day = NaiveDate::from_ymd_opt(2025, 9, 28);
		let filters = FilterSet {
			channel: Some("local".into()),
			date_from: day,
			date_to: day,
			..Default::default()
		};
		let records = LogQuery::new(&driver(&file, 100)).filter(filters).execute().unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].message, "mid");
	}

	#[test]
	fn skips_continuation_and_blank_lines() {
		let file = log_file(
			"[2025-09-28 12:00:00] local.ERROR: boom {\"exception\":\"x\"}\n[stacktrace]\n#0 /app/index.php(1): run()\n\n[2025-09-28 12:00:01] local.INFO: recovered\n",
		);
		let records = LogQuery::new(&driver(&file, 100)).execute().unwrap();
		let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
		assert_eq!(messages, vec!["recovered", "boom {\"exception\":\"x\"}"]);
	}

	#[test]
	fn limit_keeps_most_recent() {
		let content: Vec<String> = (1..=120)
			.map(|i| {
				let level = if i % 2 == 0 { "ERROR" } else { "INFO" };
				format!("[2025-09-28 11:{:02}:{:02}] local.{}: Entry {}", i / 60, i % 60, level, i)
			})
			.collect();
		let file = log_file(&content.join("\n"));
		let records = LogQuery::new(&driver(&file, 50)).execute().unwrap();
		assert_eq!(records.len(), 50);
		assert_eq!(records[0].message, "Entry 120");
		assert_eq!(records[49].message, "Entry 71");
	}

	#[test]
	fn same_query_twice_gives_same_result() {
		let file = log_file(TWO_LINES);
		let driver = driver(&file, 10);
		let query = QueryDescriptor::build(FilterSet::default(), "entry", 10);
		assert_eq!(driver.execute(&query).unwrap(), driver.execute(&query).unwrap());
	}

	#[test]
	fn missing_file_is_io_failure() {
		let driver = FileDriver::new(FileDriverConfig {
			path: PathBuf::from("/nonexistent/dir/laravel.log"),
			chunk_size: 1024,
			limit: 10,
		});
		let err = LogQuery::new(&driver).execute().unwrap_err();
		assert_eq!(err.kind, DriverErrorKind::IoFailure);
	}
}
