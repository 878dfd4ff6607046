use std::sync::Arc;

use logreader::DriverKind;
use tokio::sync::RwLock;

use crate::config::{ConfigError, ReaderConfig};
use crate::reader::LogReader;
use crate::tool::LogReaderTool;

/// Process-wide state. The engine is immutable; a reload builds a new one
/// and swaps the pointer, so queries already running keep the old engine.
pub struct Context {
	reader: RwLock<Arc<LogReader>>,
	pub tool: LogReaderTool,
}

impl Context {
	pub fn new(config: &ReaderConfig) -> Result<Self, ConfigError> {
		Ok(Context {
			reader: RwLock::new(Arc::new(LogReader::from_config(config)?)),
			tool: LogReaderTool::new(config.tool.clone()),
		})
	}

	pub async fn current(&self) -> Arc<LogReader> {
		self.reader.read().await.clone()
	}

	/// Reloads from the config file and environment. On error the current
	/// engine stays in place.
	pub async fn reload(&self) -> Result<DriverKind, ConfigError> {
		let config = ReaderConfig::load()?;
		self.reload_from(&config).await
	}

	pub async fn reload_from(&self, config: &ReaderConfig) -> Result<DriverKind, ConfigError> {
		let reader = LogReader::from_config(config)?;
		let kind = reader.kind();
		*self.reader.write().await = Arc::new(reader);
		log::info!("log reader reloaded with {} driver", kind);
		Ok(kind)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn reload_swaps_engine() {
		let ctx = Context::new(&ReaderConfig::default()).unwrap();
		let before = ctx.current().await;
		assert_eq!(before.kind(), DriverKind::File);
		let config = ReaderConfig {
			driver: "db".into(),
			..Default::default()
		};
		assert_eq!(ctx.reload_from(&config).await.unwrap(), DriverKind::Db);
		assert_eq!(ctx.current().await.kind(), DriverKind::Db);
		// a holder of the old engine is unaffected
		assert_eq!(before.kind(), DriverKind::File);
	}

	#[tokio::test]
	async fn failed_reload_keeps_engine() {
		let ctx = Context::new(&ReaderConfig::default()).unwrap();
		let config = ReaderConfig {
			driver: "nope".into(),
			..Default::default()
		};
		assert!(ctx.reload_from(&config).await.is_err());
		assert_eq!(ctx.current().await.kind(), DriverKind::File);
	}
}
