//! End-to-end tests: a real server on a loopback port driven by reqwest.

mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use http_service_router::config::{LimitsConfig, ListenerConfig};
use http_service_router::dispatch::ConnectionHooksFactory;
use http_service_router::lifecycle::Shutdown;
use http_service_router::net::{HttpServer, Listener};
use http_service_router::routing::RouteTable;
use http_service_router::service::{FileService, Service, ServiceFactory};
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(routes: RouteTable, max_full_request_bytes: usize) -> Self {
        Self::start_with_hooks(routes, max_full_request_bytes, ConnectionHooksFactory::default()).await
    }

    async fn start_with_hooks(
        routes: RouteTable,
        max_full_request_bytes: usize,
        hooks: ConnectionHooksFactory,
    ) -> Self {
        let listener = Listener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 16,
        })
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let limits = LimitsConfig { max_full_request_bytes };
        let server = HttpServer::new(routes, hooks, &limits);
        let shutdown = Shutdown::new();
        let run_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            server.run(listener, run_shutdown).await.unwrap();
        });

        Self { addr, shutdown, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn routes() -> RouteTable {
    let mut table = RouteTable::new();
    table
        .register_path("/hello", ServiceFactory::shared_lightweight(Hello))
        .unwrap()
        .register_path("/size", ServiceFactory::shared_full_request(BodySize))
        .unwrap()
        .register_path("/shout", ServiceFactory::full_response::<Shout>())
        .unwrap()
        .register_path("/fail", ServiceFactory::shared_lightweight(Failing))
        .unwrap()
        .register_path("/midway", ServiceFactory::general::<FailsMidResponse>())
        .unwrap()
        .register_path(
            "/echo",
            ServiceFactory::new(|| {
                Service::general(Echo {
                    released: Arc::new(AtomicUsize::new(0)),
                })
            }),
        )
        .unwrap();
    table
}

#[tokio::test]
async fn serves_every_variant() {
    let server = TestServer::start(routes(), 1024).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello");

    let resp = client.post(server.url("/size")).body("twelve bytes").send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "12");

    let resp = client.post(server.url("/shout")).body("quiet").send().await.unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.text().await.unwrap(), "QUIET");

    let resp = client.post(server.url("/echo")).body("ping").send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ping");
}

#[tokio::test]
async fn each_connection_gets_its_own_hooks() {
    let log = Arc::new(HookLog::default());
    let created = Arc::new(AtomicUsize::new(0));
    let hooks = {
        let log = log.clone();
        let created = created.clone();
        ConnectionHooksFactory::new(move || {
            created.fetch_add(1, Ordering::SeqCst);
            RecordingHooks::new(log.clone())
        })
    };
    let server = TestServer::start_with_hooks(routes(), 1024, hooks).await;

    // Separate clients never share a connection.
    for _ in 0..2 {
        let resp = reqwest::Client::new().get(server.url("/hello")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "Hello");
    }

    assert_eq!(created.load(Ordering::SeqCst), 2);
    let services = log.services.lock().unwrap().clone();
    assert_eq!(
        services.iter().map(|(uri, _, n)| (uri.as_str(), *n)).collect::<Vec<_>>(),
        vec![("/hello", 1), ("/hello", 1)]
    );
}

#[tokio::test]
async fn unmatched_route_is_404() {
    let server = TestServer::start(routes(), 1024).await;
    let resp = reqwest::get(server.url("/nope")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn failing_service_answers_500_and_connection_survives() {
    let server = TestServer::start(routes(), 1024).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/fail")).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp.bytes().await.unwrap().is_empty());

    let resp = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn oversized_buffered_request_is_413() {
    let server = TestServer::start(routes(), 16).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/size"))
        .body(vec![b'x'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    assert_eq!(resp.headers()["connection"], "close");
}

#[tokio::test]
async fn streaming_services_are_not_size_limited() {
    let server = TestServer::start(routes(), 16).await;
    let client = reqwest::Client::new();

    let body = "y".repeat(1000);
    let resp = client.post(server.url("/echo")).body(body.clone()).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), body);
}

#[tokio::test]
async fn failure_mid_response_truncates() {
    let server = TestServer::start(routes(), 1024).await;
    let client = reqwest::Client::new();

    match client.post(server.url("/midway")).body("data").send().await {
        Ok(resp) => assert!(resp.bytes().await.is_err()),
        Err(_) => {}
    }
}

#[tokio::test]
async fn serves_files_from_directory() {
    let dir = std::env::temp_dir().join(format!("hsr-files-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("note.txt"), "file contents").await.unwrap();

    let mut table = routes();
    table
        .register_directory("/files/", FileService::directory("/files/", &dir).into_factory())
        .unwrap();
    let server = TestServer::start(table, 1024).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/files/note.txt")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(resp.headers()["content-length"], "13");
    assert_eq!(resp.text().await.unwrap(), "file contents");

    let resp = client.get(server.url("/files/absent.txt")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client.post(server.url("/files/note.txt")).send().await.unwrap();
    assert_eq!(resp.status(), 405);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let server = TestServer::start(routes(), 1024).await;
    let client = reqwest::Client::new();
    let resp = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();
}
