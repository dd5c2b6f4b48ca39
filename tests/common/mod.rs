//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{body::Body, http::Response, Router};
use fault_injector::config::InjectorConfig;
use fault_injector::injection::InjectionRule;
use fault_injector::HttpServer;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const SERVICE: &str = "storage-service";

/// Default config carrying `rules`, with registry faults kept small.
pub fn config_with_rules(rules: Vec<InjectionRule>) -> InjectorConfig {
    let mut config = InjectorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.faults.cpu_spike.workers = 1;
    config.faults.cpu_spike.intensity = 10;
    config.faults.memory_leak.chunk_bytes = 1024;
    config.faults.memory_leak.interval_ms = 10;
    config.faults.memory_leak.max_bytes = 64 * 1024;
    for rule in rules {
        config.rules.insert(rule.id.clone(), rule);
    }
    config
}

/// The fully layered router for `rules`, backed by the echo handler.
pub fn build_app(rules: Vec<InjectionRule>) -> Router {
    HttpServer::new(config_with_rules(rules)).router()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]).to_string();
                        let path = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();

                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
