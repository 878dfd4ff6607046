use serde::Serialize;

use crate::driver::{DriverError, LogDriver};
use crate::filters::FilterSet;
use crate::record::LogRecord;

/// Fully resolved request handed to a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDescriptor {
	filters: FilterSet,
	search_term: String,
	limit: usize,
}

impl QueryDescriptor {
	/// The term is trimmed; an empty term means no search clause. A zero
	/// limit is raised to one.
	pub fn build(filters: FilterSet, query: &str, limit: usize) -> Self {
		Self {
			filters,
			search_term: query.trim().to_string(),
			limit: limit.max(1),
		}
	}

	pub fn filters(&self) -> &FilterSet {
		&self.filters
	}

	pub fn search_term(&self) -> &str {
		&self.search_term
	}

	/// `None` when the search stage lets every record through.
	pub fn search(&self) -> Option<&str> {
		if self.search_term.is_empty() {
			None
		} else {
			Some(&self.search_term)
		}
	}

	pub fn limit(&self) -> usize {
		self.limit
	}
}

/// Fluent front for a driver:
/// `LogQuery::new(&driver).filter(filters).search("failed").execute()`.
pub struct LogQuery<'a> {
	driver: &'a dyn LogDriver,
	filters: FilterSet,
	search: String,
}

impl<'a> LogQuery<'a> {
	pub fn new(driver: &'a dyn LogDriver) -> Self {
		Self {
			driver,
			filters: FilterSet::default(),
			search: String::new(),
		}
	}

	pub fn filter(mut self, filters: FilterSet) -> Self {
		self.filters = filters;
		self
	}

	pub fn search(mut self, term: &str) -> Self {
		self.search = term.to_string();
		self
	}

	pub fn descriptor(&self) -> QueryDescriptor {
		QueryDescriptor::build(self.filters.clone(), &self.search, self.driver.limit())
	}

	pub fn execute(self) -> Result<Vec<LogRecord>, DriverError> {
		let descriptor = self.descriptor();
		self.driver.execute(&descriptor)
	}
}
