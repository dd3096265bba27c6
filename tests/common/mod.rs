//! Shared fixtures for the HTTP-backed integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use protect_archiver::config::Config;

pub const TOKEN: &str = "abc123";

/// Plain-HTTP config pointed at `server`, with no retry delay.
pub fn config_for(server: &MockServer, dest: &Path) -> Config {
    config_at(*server.address(), dest)
}

pub fn config_at(addr: SocketAddr, dest: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.server.protocol = "http".into();
    cfg.server.address = addr.ip().to_string();
    cfg.server.port = Some(addr.port());
    cfg.server.username = "archiver".into();
    cfg.server.password = Some("secret".into());
    cfg.download.destination_path = dest.to_path_buf();
    cfg.download.use_subfolders = false;
    cfg.download.use_utc_filenames = true;
    cfg.download.min_retry_delay_secs = 0;
    cfg.download.download_timeout_secs = 5.0;
    cfg
}

/// UniFi OS login answering with a `TOKEN` cookie, expected `times` times.
pub async fn mount_cookie_login(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", format!("TOKEN={TOKEN}; Path=/; HttpOnly").as_str()),
        )
        .expect(times)
        .mount(server)
        .await;
}

pub fn clip(len: usize) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_bytes(vec![0x47u8; len])
}

/// Minimal console that accepts any login and answers every GET with a
/// chunked body of `body_len` bytes, so no `Content-Length` is sent.
pub async fn spawn_chunked_console(body_len: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Some(head) = read_request(&mut socket).await else {
                    return;
                };
                let response = if head.starts_with("post") {
                    format!(
                        "HTTP/1.1 200 OK\r\nSet-Cookie: TOKEN={TOKEN}; Path=/\r\n\
                         Content-Length: 0\r\nConnection: close\r\n\r\n"
                    )
                } else {
                    format!(
                        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\
                         Connection: close\r\n\r\n{body_len:x}\r\n{}\r\n0\r\n\r\n",
                        "G".repeat(body_len)
                    )
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Reads one request including its body; returns the lowercased head.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
    let body_len = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + body_len {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(head)
}
