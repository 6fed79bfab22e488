//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use readiness_gate::config::ProxyConfig;
use readiness_gate::{HttpServer, Shutdown};

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Read the request head and return its path.
async fn read_path(socket: &mut TcpStream) -> String {
    let mut buf = vec![0u8; 8192];
    let mut filled = 0;
    while filled < buf.len() {
        match socket.read(&mut buf[filled..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
        if buf[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let head = String::from_utf8_lossy(&buf[..filled]);
    head.split_whitespace().nth(1).unwrap_or("/").to_string()
}

async fn write_response(socket: &mut TcpStream, status: u16, headers: &[(&str, &str)], body: &str) {
    let mut response = format!("HTTP/1.1 {}\r\n", status_text(status));
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// An address nothing is listening on (yet).
pub async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a programmable mock backend on `addr`.
///
/// `f` returns status, extra headers and body for each request.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<(&'static str, &'static str)>, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let _ = read_path(&mut socket).await;
                        let (status, headers, body) = f().await;
                        write_response(&mut socket, status, &headers, &body).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a mock status endpoint. `f` maps a service id to its status, or
/// `None` to answer 500.
pub async fn start_status_server<F>(f: F) -> SocketAddr
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
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
                        let path = read_path(&mut socket).await;
                        // Paths look like /services/{service}/status
                        let service = path.split('/').nth(2).unwrap_or_default().to_string();
                        match f(&service) {
                            Some(status) => {
                                let body = format!(r#"{{"status":"{}"}}"#, status);
                                write_response(&mut socket, 200, &[("Content-Type", "application/json")], &body).await;
                            }
                            None => write_response(&mut socket, 500, &[], "status backend broken").await,
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Base config pointing the gate at `status_addr` and `upstream_addr`.
pub fn gate_config(status_addr: SocketAddr, upstream_addr: SocketAddr, dependencies: &[&str]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.gate.name = "e2e-gate".into();
    config.gate.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
    config.gate.timeout_ms = 2_000;
    config.gate.poll_interval_ms = 50;
    config.status.url_template = format!("http://{}/services/{{service}}/status", status_addr);
    config.status.timeout_ms = 1_000;
    config.upstream.address = upstream_addr.to_string();
    config.timeouts.request_secs = 10;
    config
}

/// Spawn the gate server and return the address it listens on.
pub async fn spawn_gate(config: ProxyConfig, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
