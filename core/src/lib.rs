mod chunk_reader;
mod driver;
mod file_driver;
pub mod filters;
mod logline;
mod query;
mod record;

pub use chunk_reader::ReverseChunkReader;
pub use driver::{DriverError, DriverErrorKind, DriverKind, LogDriver};
pub use file_driver::{FileDriver, FileDriverConfig};
pub use filters::{FilterSet, ValidationError};
pub use logline::{parse_line, LogLine};
pub use query::{LogQuery, QueryDescriptor};
pub use record::{normalize, normalize_level, parse_payload, parse_timestamp, LogRecord, RawRecord, RecordError, RecordId};
