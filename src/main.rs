//! Service-routing HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ net::listener ─▶ net::server ─▶ dispatch::ServiceDispatcher
//!                                       (hyper)          │
//!                                                        ▼
//!                                                  routing::RouteTable
//!                                                        │
//!                                                        ▼
//!                                                  service (one of four
//!                                                  handler contracts)
//!                                                        │
//!     Client Response                                    ▼
//!     ◀───────────── net::transport ◀──────────── protocol::Connection
//!                                                 (ordering checks)
//! ```
//!
//! The binary registers a few demonstration services plus any static
//! directories from the config file.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use hyper::StatusCode;
use serde::Serialize;

use http_service_router::config::{load_config, ServerConfig};
use http_service_router::dispatch::ConnectionHooksFactory;
use http_service_router::lifecycle::{signals, Shutdown};
use http_service_router::message::{
    media, ContentBlock, FullRequest, FullResponse, LastContentBlock, RequestWithoutBody, ResponseWithoutBody,
};
use http_service_router::net::{HttpServer, Listener};
use http_service_router::observability::{logging, metrics};
use http_service_router::protocol::Connection;
use http_service_router::routing::RouteTable;
use http_service_router::service::{
    FileService, FullResponseService, GeneralService, GetOnly, JsonGet, JsonGetService, LightweightService,
    ServiceError, ServiceFactory,
};

#[derive(Debug, Parser)]
#[command(name = "http-service-router", version, about = "Service-routing HTTP server")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level.to_ascii_lowercase());
    tracing::info!("http-service-router v{} starting", env!("CARGO_PKG_VERSION"));

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(threads) = config.runtime.worker_threads {
        runtime.worker_threads(threads);
    }
    runtime.build()?.block_on(run(config))
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        max_full_request_bytes = config.limits.max_full_request_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let routes = build_routes(&config)?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(routes, ConnectionHooksFactory::default(), &config.limits);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_routes(config: &ServerConfig) -> Result<RouteTable, Box<dyn std::error::Error>> {
    let mut routes = RouteTable::new();
    routes
        .register_path("/hello", ServiceFactory::shared_lightweight(GetOnly(Hello)))?
        .register_path("/status", ServiceFactory::shared_lightweight(JsonGet(Status)))?
        .register_path("/echo", ServiceFactory::general::<Echo>())?
        .register_path("/count", ServiceFactory::full_response::<ByteCounter>())?;

    for dir in &config.static_dirs {
        let service = FileService::directory(&dir.uri_prefix, &dir.directory);
        let prefix = service.uri_root().unwrap_or(dir.uri_prefix.as_str()).to_string();
        tracing::info!(uri_prefix = %prefix, directory = %dir.directory, "Serving static directory");
        routes.register_directory(&prefix, service.into_factory())?;
    }

    Ok(routes)
}

/// `GET /hello`: a plain-text greeting.
struct Hello;

#[async_trait]
impl LightweightService for Hello {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        let name = request
            .query_params()
            .get("name")
            .and_then(|values| values.first())
            .map_or("world", String::as_str);
        Ok(FullResponse::text(StatusCode::OK, format!("Hello, {name}!")))
    }
}

#[derive(Serialize)]
struct StatusReport {
    name: &'static str,
    version: &'static str,
}

/// `GET /status`: build information as JSON.
struct Status;

#[async_trait]
impl JsonGetService for Status {
    type Output = StatusReport;

    async fn serve_json(&self, _request: &FullRequest) -> Result<StatusReport, ServiceError> {
        Ok(StatusReport {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        })
    }
}

/// `/echo`: streams the request body straight back.
#[derive(Default)]
struct Echo;

#[async_trait]
impl GeneralService for Echo {
    async fn serve_request_without_body(
        &mut self,
        request: &RequestWithoutBody,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        let mut head = ResponseWithoutBody::new(StatusCode::OK);
        head.set_content_type(request.content_type().unwrap_or(media::APPLICATION_OCTET_STREAM));
        connection.send_response_without_body(head)?;
        Ok(())
    }

    async fn serve_content_block(
        &mut self,
        block: ContentBlock,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        connection.send_content_block(block)?;
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        block: LastContentBlock,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        connection.send_last_content_block(block)?;
        Ok(())
    }
}

/// `/count`: replies with the number of body bytes received.
#[derive(Default)]
struct ByteCounter {
    total: usize,
}

#[async_trait]
impl FullResponseService for ByteCounter {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_content_block(
        &mut self,
        block: ContentBlock,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        self.total += block.len();
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        block: LastContentBlock,
        response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        self.total += block.content().len();
        response.set_content_type(media::TEXT_PLAIN_UTF8);
        response.set_body(Bytes::from(self.total.to_string()));
        Ok(())
    }
}
