use std::fmt;
use std::str::FromStr;

use crate::query::QueryDescriptor;
use crate::record::LogRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
	File,
	Db,
}

impl FromStr for DriverKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"file" => Ok(DriverKind::File),
			"db" | "database" => Ok(DriverKind::Db),
			other => Err(format!("unknown log driver {:?}", other)),
		}
	}
}

impl fmt::Display for DriverKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DriverKind::File => write!(f, "file"),
			DriverKind::Db => write!(f, "db"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
	IoFailure,
	QueryFailure,
	ConnectionFailure,
}

/// Runtime failure while reading a log source. The message carries internal
/// detail (paths, tables, SQL errors) and is meant for diagnostics only.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct DriverError {
	pub kind: DriverErrorKind,
	pub message: String,
}

impl DriverError {
	pub fn io(message: impl Into<String>) -> Self {
		Self {
			kind: DriverErrorKind::IoFailure,
			message: message.into(),
		}
	}

	pub fn query(message: impl Into<String>) -> Self {
		Self {
			kind: DriverErrorKind::QueryFailure,
			message: message.into(),
		}
	}

	pub fn connection(message: impl Into<String>) -> Self {
		Self {
			kind: DriverErrorKind::ConnectionFailure,
			message: message.into(),
		}
	}
}

/// A log source. Implementations hold only read-only configuration, so one
/// driver can serve concurrent queries; every call re-opens its source.
pub trait LogDriver: Send + Sync {
	fn kind(&self) -> DriverKind;

	/// Configured maximum number of records a single query may return.
	fn limit(&self) -> usize;

	/// Runs one query. Results are ordered most recent first and never hold
	/// more than `query.limit` records. A failure part way through discards
	/// everything read so far.
	fn execute(&self, query: &QueryDescriptor) -> Result<Vec<LogRecord>, DriverError>;
}
