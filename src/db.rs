use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::sqlite::Sqlite;
use logreader::{normalize, DriverError, DriverKind, FilterSet, LogDriver, LogRecord, QueryDescriptor, RawRecord};

use crate::config::{ColumnKind, ConfigError, DbConfig, LogicalColumn};

type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

const POOL_SIZE: u32 = 4;

diesel::define_sql_function! {
	/// Unicode lowercase. SQLite's own `LOWER` folds ASCII only.
	fn fold_case(text: Nullable<Text>) -> Nullable<Text>;
}

#[derive(Debug)]
struct FoldCase;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for FoldCase {
	fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
		fold_case_utils::register_impl(conn, |text: Option<String>| text.map(|text| text.to_lowercase()))
			.map_err(diesel::r2d2::Error::QueryError)
	}
}

#[derive(Debug, QueryableByName)]
struct LogRow {
	#[diesel(sql_type = Nullable<Text>)]
	id: Option<String>,
	#[diesel(sql_type = Nullable<Text>)]
	level: Option<String>,
	#[diesel(sql_type = Nullable<Text>)]
	message: Option<String>,
	#[diesel(sql_type = Nullable<Text>)]
	timestamp: Option<String>,
	#[diesel(sql_type = Nullable<Text>)]
	channel: Option<String>,
	#[diesel(sql_type = Nullable<Text>)]
	context: Option<String>,
	#[diesel(sql_type = Nullable<Text>)]
	extra: Option<String>,
}

impl From<LogRow> for RawRecord {
	fn from(row: LogRow) -> Self {
		RawRecord {
			id: row.id,
			level: row.level,
			message: row.message,
			timestamp: row.timestamp,
			channel: row.channel,
			context: row.context,
			extra: row.extra,
		}
	}
}

/// SQL text plus its text binds, in placeholder order. Paging binds
/// (`LIMIT ? OFFSET ?`) are appended per chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
	pub sql: String,
	pub binds: Vec<String>,
}

fn quote(identifier: &str) -> String {
	identifier
		.split('.')
		.map(|part| format!("\"{}\"", part))
		.collect::<Vec<_>>()
		.join(".")
}

fn escape_like(term: &str) -> String {
	let mut escaped = String::with_capacity(term.len() + 2);
	escaped.push('%');
	for c in term.chars() {
		if matches!(c, '\\' | '%' | '_') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped.push('%');
	escaped
}

/// The term as it appears inside a serialized JSON string.
fn json_escaped(term: &str) -> Option<String> {
	let encoded = serde_json::to_string(term).ok()?;
	let inner = &encoded[1..encoded.len() - 1];
	if inner == term {
		None
	} else {
		Some(inner.to_string())
	}
}

pub fn build_statement(config: &DbConfig, query: &QueryDescriptor) -> Statement {
	let columns = &config.columns;
	let select = |column: LogicalColumn| match columns.physical(column) {
		Some(name) => format!("CAST({} AS TEXT) AS {}", quote(name), column),
		None => format!("NULL AS {}", column),
	};
	let mut sql = format!(
		"SELECT {}, {}, {}, {}, {}, {}, {} FROM {} WHERE 1 = 1",
		select(LogicalColumn::Id),
		select(LogicalColumn::Level),
		select(LogicalColumn::Message),
		select(LogicalColumn::Timestamp),
		select(LogicalColumn::Channel),
		select(LogicalColumn::Context),
		select(LogicalColumn::Extra),
		quote(config.table.trim()),
	);
	let mut binds = Vec::new();
	push_filters(&mut sql, &mut binds, config, query.filters());

	if let Some(term) = query.search() {
		let mut clauses = Vec::new();
		for searchable in &config.searchable_columns {
			let Some(name) = columns.physical(searchable.column) else {
				continue;
			};
			match searchable.kind {
				ColumnKind::Text => {
					clauses.push(format!("fold_case(CAST({} AS TEXT)) LIKE ? ESCAPE '\\'", quote(name)));
					binds.push(escape_like(&term.to_lowercase()));
				}
				ColumnKind::Json => {
					clauses.push(format!("CAST({} AS TEXT) LIKE ? ESCAPE '\\'", quote(name)));
					binds.push(escape_like(term));
					if let Some(escaped) = json_escaped(term) {
						clauses.push(format!("CAST({} AS TEXT) LIKE ? ESCAPE '\\'", quote(name)));
						binds.push(escape_like(&escaped));
					}
				}
			}
		}
		if clauses.is_empty() {
			sql.push_str(" AND 0 = 1");
		} else {
			sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
		}
	}

	// validated configs always map the timestamp
	let timestamp = columns.physical(LogicalColumn::Timestamp).unwrap_or("created_at");
	sql.push_str(&format!(" ORDER BY {} DESC", quote(timestamp)));
	if let Some(id) = columns.physical(LogicalColumn::Id) {
		sql.push_str(&format!(", {} DESC", quote(id)));
	}
	sql.push_str(" LIMIT ? OFFSET ?");
	Statement { sql, binds }
}

fn push_filters(sql: &mut String, binds: &mut Vec<String>, config: &DbConfig, filters: &FilterSet) {
	let columns = &config.columns;
	if let Some(level) = &filters.level {
		match columns.physical(LogicalColumn::Level) {
			Some(name) => {
				sql.push_str(&format!(" AND LOWER({}) = LOWER(?)", quote(name)));
				binds.push(level.clone());
			}
			None => sql.push_str(" AND 0 = 1"),
		}
	}
	if let Some(channel) = &filters.channel {
		match columns.physical(LogicalColumn::Channel) {
			Some(name) => {
				sql.push_str(&format!(" AND {} = ?", quote(name)));
				binds.push(channel.clone());
			}
			None => sql.push_str(" AND 0 = 1"),
		}
	}
	// the stored wall-clock day, offsets are not converted
	if let Some(timestamp) = columns.physical(LogicalColumn::Timestamp) {
		if let Some(from) = filters.date_from {
			sql.push_str(&format!(" AND substr(CAST({} AS TEXT), 1, 10) >= ?", quote(timestamp)));
			binds.push(from.format("%Y-%m-%d").to_string());
		}
		if let Some(to) = filters.date_to {
			sql.push_str(&format!(" AND substr(CAST({} AS TEXT), 1, 10) <= ?", quote(timestamp)));
			binds.push(to.format("%Y-%m-%d").to_string());
		}
	}
}

fn database_url(connection: &str) -> &str {
	connection.strip_prefix("sqlite://").unwrap_or(connection)
}

/// Reads log rows from a SQLite table through a small connection pool.
pub struct DbDriver {
	config: DbConfig,
	pool: SqlitePool,
}

impl DbDriver {
	pub fn new(config: DbConfig) -> Result<Self, ConfigError> {
		config.validate()?;
		let manager = ConnectionManager::<SqliteConnection>::new(database_url(config.connection.trim()));
		// connections are opened on first use so an unreachable database
		// shows up as a query-time connection failure
		let pool = Pool::builder()
			.max_size(POOL_SIZE)
			.min_idle(Some(0))
			.connection_timeout(Duration::from_millis(config.connection_timeout_ms.max(1)))
			.connection_customizer(Box::new(FoldCase))
			.build_unchecked(manager);
		Ok(DbDriver { config, pool })
	}

	pub fn config(&self) -> &DbConfig {
		&self.config
	}

	/// Rows that do not normalize (no message, unreadable timestamp) are
	/// skipped and do not count toward the limit.
	fn fetch(&self, conn: &mut SqliteConnection, statement: &Statement, limit: usize) -> QueryResult<Vec<LogRecord>> {
		let chunk_size = self.config.chunk_size.max(1);
		let mut records: Vec<LogRecord> = Vec::new();
		let mut offset: i64 = 0;
		while records.len() < limit {
			let page = chunk_size.min(limit - records.len());
			let mut query = diesel::sql_query(statement.sql.as_str()).into_boxed::<Sqlite>();
			for bind in &statement.binds {
				query = query.bind::<Text, _>(bind.clone());
			}
			let batch: Vec<LogRow> = query
				.bind::<BigInt, _>(page as i64)
				.bind::<BigInt, _>(offset)
				.load(conn)?;
			let fetched = batch.len();
			log::debug!("fetched {} rows at offset {}", fetched, offset);
			for row in batch {
				match normalize(RawRecord::from(row)) {
					Ok(record) => records.push(record),
					Err(err) => log::warn!("skipping row in {}: {}", self.config.table, err),
				}
			}
			if fetched < page {
				break;
			}
			offset += fetched as i64;
		}
		Ok(records)
	}
}

impl LogDriver for DbDriver {
	fn kind(&self) -> DriverKind {
		DriverKind::Db
	}

	fn limit(&self) -> usize {
		self.config.limit
	}

	fn execute(&self, query: &QueryDescriptor) -> Result<Vec<LogRecord>, DriverError> {
		let statement = build_statement(&self.config, query);
		let mut conn = self
			.pool
			.get()
			.map_err(|err| DriverError::connection(format!("cannot connect to {}: {}", self.config.connection, err)))?;
		// one snapshot for every chunk
		let records = conn
			.transaction(|conn| self.fetch(conn, &statement, query.limit()))
			.map_err(|err| DriverError::query(format!("query on {} failed: {}", self.config.table, err)))?;
		log::debug!("db driver matched {} records in {}", records.len(), self.config.table);
		Ok(records)
	}
}
