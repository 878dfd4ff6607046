use std::sync::Arc;

use logreader_server::config::{listen_addr, log_level, ReaderConfig};
use logreader_server::context::Context;
use logreader_server::controllers::app;
use simple_logger::SimpleLogger;

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		log::error!("cannot listen for shutdown signal: {}", err);
	}
	log::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	SimpleLogger::new().with_level(log_level()).init().ok();

	let config = ReaderConfig::load()?;
	let ctx = Arc::new(Context::new(&config)?);
	log::info!("{} driver selected", config.driver_kind()?);

	let addr = listen_addr();
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	log::info!("listening on {}", addr);
	axum::serve(listener, app(ctx))
		.with_graceful_shutdown(shutdown_signal())
		.await?;
	Ok(())
}
