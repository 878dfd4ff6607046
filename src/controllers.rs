use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use logreader::LogRecord;
use serde_json::{json, Value};
use tokio::task::spawn_blocking;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::context::Context;
use crate::reader::ReaderError;
use crate::tool::{server_info, ToolResponse};
use crate::types::GetLogsQuery;

pub fn app(ctx: Arc<Context>) -> Router {
	let mut router = Router::new()
		.route("/api/server", get(get_server_info))
		.route("/api/logs", get(get_logs))
		.route("/api/config/reload", post(reload_config));
	if ctx.tool.should_register() {
		router = router
			.route("/api/tool/schema", get(get_tool_schema))
			.route("/api/tool/call", post(call_tool));
	} else {
		log::info!("tool {} is disabled", ctx.tool.name());
	}
	router
		.layer(CorsLayer::permissive())
		.layer(CompressionLayer::new())
		.with_state(ctx)
}

pub async fn get_server_info(State(ctx): State<Arc<Context>>) -> Json<Value> {
	let mut info = server_info(&ctx.tool);
	info["driver"] = json!(ctx.current().await.kind().to_string());
	Json(info)
}

pub async fn get_tool_schema(State(ctx): State<Arc<Context>>) -> Json<Value> {
	Json(ctx.tool.metadata())
}

pub async fn call_tool(State(ctx): State<Arc<Context>>, Json(input): Json<Value>) -> Result<Json<ToolResponse>, StatusCode> {
	let reader = ctx.current().await;
	let tool = ctx.tool.clone();
	let response = spawn_blocking(move || tool.handle(&reader, &input))
		.await
		.map_err(|err| {
			log::error!("tool call panicked: {}", err);
			StatusCode::INTERNAL_SERVER_ERROR
		})?;
	Ok(Json(response))
}

pub async fn get_logs(
	State(ctx): State<Arc<Context>>,
	Query(params): Query<GetLogsQuery>,
) -> Result<Json<Vec<LogRecord>>, Response> {
	log::info!("get_logs {:?}", params);
	let reader = ctx.current().await;
	let records = spawn_blocking(move || {
		let filters = params.filters();
		reader.query(params.query.as_deref().unwrap_or_default(), Some(&filters))
	})
	.await
	.map_err(|err| {
		log::error!("log query panicked: {}", err);
		StatusCode::INTERNAL_SERVER_ERROR.into_response()
	})?;
	match records {
		Ok(records) => Ok(Json(records)),
		Err(err @ ReaderError::Validation(_)) => Err(BadRequestError(err.public_message()).into_response()),
		Err(err) => Err(InternalError(err.public_message()).into_response()),
	}
}

pub async fn reload_config(State(ctx): State<Arc<Context>>) -> Result<Json<Value>, InternalError> {
	match ctx.reload().await {
		Ok(kind) => Ok(Json(json!({ "driver": kind.to_string() }))),
		Err(err) => {
			log::error!("config reload failed: {}", err);
			Err(InternalError("Reload failed. Check server logs for details.".to_string()))
		}
	}
}

#[derive(Debug)]
pub(crate) struct BadRequestError(String);

impl IntoResponse for BadRequestError {
	fn into_response(self) -> Response {
		(
			StatusCode::BAD_REQUEST,
			Json(json!({
				"error": self.0
			})),
		)
			.into_response()
	}
}

#[derive(Debug)]
pub struct InternalError(String);

impl IntoResponse for InternalError {
	fn into_response(self) -> Response {
		(
			StatusCode::INTERNAL_SERVER_ERROR,
			Json(json!({
				"error": self.0
			})),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{FileConfig, ReaderConfig, ToolConfig};
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use std::io::Write;
	use tempfile::{NamedTempFile, TempDir};
	use tower::ServiceExt;

	const LINES: &str = "[2025-09-27 08:00:00] local.INFO: User logged in\n[2025-09-28 12:00:00] payment.ERROR: Payment failed {\"order\":7}\n[2025-09-28 12:05:00] local.DEBUG: Cache cleared\n";

	fn log_file() -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(LINES.as_bytes()).unwrap();
		file
	}

	fn config_for(file: &NamedTempFile) -> ReaderConfig {
		ReaderConfig {
			file: FileConfig {
				path: file.path().to_path_buf(),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn ctx(config: &ReaderConfig) -> Arc<Context> {
		Arc::new(Context::new(config).unwrap())
	}

	async fn body_json(res: Response) -> Value {
		let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&body).unwrap()
	}

	async fn get_uri(app: Router, uri: &str) -> Response {
		app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
	}

	#[tokio::test]
	async fn server_info_lists_tool() {
		let file = log_file();
		let res = get_uri(app(ctx(&config_for(&file))), "/api/server").await;
		assert_eq!(res.status(), StatusCode::OK);
		let v = body_json(res).await;
		assert_eq!(v["name"], "Log Reader Server");
		assert_eq!(v["driver"], "file");
		assert_eq!(v["tools"][0]["name"], "log-reader");
	}

	#[tokio::test]
	async fn tool_call_returns_envelope() {
		let file = log_file();
		let res = app(ctx(&config_for(&file)))
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/api/tool/call")
					.header("content-type", "application/json")
					.body(Body::from(r#"{"query":"order","filters":{"level":"ERROR"}}"#))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(res.status(), StatusCode::OK);
		let v = body_json(res).await;
		assert_eq!(v["isError"], false);
		assert_eq!(v["count"], 1);
		assert_eq!(v["records"][0]["message"], "Payment failed {\"order\":7}");
		assert_eq!(v["records"][0]["channel"], "payment");
	}

	#[tokio::test]
	async fn logs_endpoint_filters_by_day() {
		let file = log_file();
		let res = get_uri(app(ctx(&config_for(&file))), "/api/logs?dateFrom=2025-09-28&dateTo=2025-09-28").await;
		assert_eq!(res.status(), StatusCode::OK);
		let v = body_json(res).await;
		let messages: Vec<_> = v.as_array().unwrap().iter().map(|r| r["message"].as_str().unwrap().to_string()).collect();
		assert_eq!(messages, vec!["Cache cleared", "Payment failed {\"order\":7}"]);
	}

	#[tokio::test]
	async fn logs_endpoint_rejects_bad_dates() {
		let file = log_file();
		let res = get_uri(app(ctx(&config_for(&file))), "/api/logs?dateFrom=someday").await;
		assert_eq!(res.status(), StatusCode::BAD_REQUEST);
		let v = body_json(res).await;
		assert_eq!(v["error"], "Validation failed: date_from: invalid date");
	}

	#[tokio::test]
	async fn logs_endpoint_hides_driver_detail() {
		let config = ReaderConfig {
			file: FileConfig {
				path: "/nonexistent/secret/laravel.log".into(),
				..Default::default()
			},
			..Default::default()
		};
		let res = get_uri(app(ctx(&config)), "/api/logs").await;
		assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
		let v = body_json(res).await;
		assert_eq!(v["error"], "Failed to read logs. Check server logs for details.");
	}

	#[tokio::test]
	async fn disabled_tool_routes_are_absent() {
		let file = log_file();
		let mut config = config_for(&file);
		config.tool = ToolConfig {
			enabled: false,
			..Default::default()
		};
		let res = get_uri(app(ctx(&config)), "/api/tool/schema").await;
		assert_eq!(res.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn schema_route() {
		let file = log_file();
		let res = get_uri(app(ctx(&config_for(&file))), "/api/tool/schema").await;
		assert_eq!(res.status(), StatusCode::OK);
		let v = body_json(res).await;
		assert_eq!(v["title"], "Log Reader Tool");
		assert_eq!(v["inputSchema"]["type"], "object");
	}

	#[tokio::test]
	#[serial_test::serial]
	async fn reload_reads_environment() {
		let file = log_file();
		let dir = TempDir::new().unwrap();
		let config_path = dir.path().join("reader.json");
		std::fs::write(&config_path, r#"{"driver": "db"}"#).unwrap();
		std::env::set_var("LOG_READER_CONFIG", &config_path);
		let ctx = ctx(&config_for(&file));
		let res = app(ctx.clone())
			.oneshot(Request::builder().method("POST").uri("/api/config/reload").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(res.status(), StatusCode::OK);
		assert_eq!(body_json(res).await["driver"], "db");

		std::env::set_var("LOG_READER_DRIVER", "carrier-pigeon");
		let res = app(ctx.clone())
			.oneshot(Request::builder().method("POST").uri("/api/config/reload").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(ctx.current().await.kind(), logreader::DriverKind::Db);
		std::env::remove_var("LOG_READER_DRIVER");
		std::env::remove_var("LOG_READER_CONFIG");
	}
}
