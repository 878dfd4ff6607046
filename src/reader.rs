use logreader::{filters, DriverError, DriverKind, FileDriver, FilterSet, LogDriver, LogQuery, LogRecord, QueryDescriptor, ValidationError};
use serde_json::Value;

use crate::config::{ConfigError, ReaderConfig};
use crate::db::DbDriver;

/// The only driver failure text a caller ever sees.
pub const PUBLIC_DRIVER_ERROR: &str = "Failed to read logs. Check server logs for details.";

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
	#[error("Validation failed: {0}")]
	Validation(#[from] ValidationError),
	#[error("log driver failed: {0}")]
	Driver(#[from] DriverError),
}

impl ReaderError {
	/// Caller-facing text. Driver detail stays in the server log.
	pub fn public_message(&self) -> String {
		match self {
			ReaderError::Validation(_) => self.to_string(),
			ReaderError::Driver(_) => PUBLIC_DRIVER_ERROR.to_string(),
		}
	}
}

/// Engine facade: one configured driver plus the two call shapes every
/// transport uses (normalize filters, execute a query).
pub struct LogReader {
	driver: Box<dyn LogDriver>,
}

impl LogReader {
	pub fn new(driver: Box<dyn LogDriver>) -> Self {
		LogReader { driver }
	}

	pub fn from_config(config: &ReaderConfig) -> Result<Self, ConfigError> {
		config.validate()?;
		let driver: Box<dyn LogDriver> = match config.driver_kind()? {
			DriverKind::File => {
				log::info!("reading logs from file {}", config.file.path.display());
				Box::new(FileDriver::new(config.file.driver_config()))
			}
			DriverKind::Db => {
				log::info!("reading logs from table {} in {}", config.db.table, config.db.connection);
				Box::new(DbDriver::new(config.db.clone())?)
			}
		};
		Ok(LogReader::new(driver))
	}

	pub fn kind(&self) -> DriverKind {
		self.driver.kind()
	}

	pub fn limit(&self) -> usize {
		self.driver.limit()
	}

	pub fn normalize_filters(&self, raw: Option<&Value>) -> Result<FilterSet, ReaderError> {
		Ok(filters::normalize(raw)?)
	}

	pub fn descriptor(&self, filters: FilterSet, query: &str) -> QueryDescriptor {
		LogQuery::new(self.driver.as_ref()).filter(filters).search(query).descriptor()
	}

	pub fn execute(&self, query: &QueryDescriptor) -> Result<Vec<LogRecord>, ReaderError> {
		match self.driver.execute(query) {
			Ok(records) => Ok(records),
			Err(err) => {
				log::error!("{} driver failed: {}", self.driver.kind(), err);
				Err(ReaderError::Driver(err))
			}
		}
	}

	/// Normalizes `raw_filters`, then runs the search.
	pub fn query(&self, query: &str, raw_filters: Option<&Value>) -> Result<Vec<LogRecord>, ReaderError> {
		let filters = self.normalize_filters(raw_filters)?;
		let descriptor = self.descriptor(filters, query);
		log::debug!("executing {:?}", descriptor);
		self.execute(&descriptor)
	}
}
