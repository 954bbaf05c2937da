//! Helpers shared by the end-to-end relay tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cors_relay::config::Config;
use cors_relay::server::Listener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A local stand-in for the third-party API.
pub struct FakeUpstream {
    pub addr: SocketAddr,
    /// Connections accepted so far
    pub hits: Arc<AtomicUsize>,
    /// Connections the client side closed before we answered
    pub abandoned: Arc<AtomicUsize>,
    /// Request heads received, in arrival order
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl FakeUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn last_request(&self) -> String {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// Upstream answering every request with `status` and `body`.
///
/// `status` is the status-line tail, e.g. `"200 OK"`.
pub async fn spawn_upstream(status: &'static str, body: Vec<u8>) -> FakeUpstream {
    spawn_fake(Some((status, body))).await
}

/// Upstream that accepts and reads, but never answers.
pub async fn spawn_silent_upstream() -> FakeUpstream {
    spawn_fake(None).await
}

async fn spawn_fake(reply: Option<(&'static str, Vec<u8>)>) -> FakeUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let abandoned = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let fake = FakeUpstream {
        addr,
        hits: hits.clone(),
        abandoned: abandoned.clone(),
        requests: requests.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            hits.fetch_add(1, Ordering::SeqCst);

            let reply = reply.clone();
            let abandoned = abandoned.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                requests.lock().unwrap().push(head);

                match reply {
                    Some((status, body)) => {
                        let head = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            status,
                            body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                    }
                    None => {
                        let mut sink = [0u8; 512];
                        loop {
                            match socket.read(&mut sink).await {
                                Ok(0) | Err(_) => break,
                                Ok(_) => {}
                            }
                        }
                        abandoned.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    fake
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// An address nothing is listening on.
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

pub async fn spawn_relay(mut cfg: Config) -> RunningRelay {
    cfg.listen_addr = "127.0.0.1:0".to_string();
    let listener = Listener::bind(&cfg).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(listener.run(rx));

    RunningRelay { addr, shutdown, task }
}

pub fn relay_path(target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/?url={}", encoded)
}

#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body is not JSON")
    }

    pub fn error_message(&self) -> String {
        self.json()["error"]
            .as_str()
            .expect("no error key")
            .to_string()
    }
}

/// Sends raw bytes on a fresh connection and reads until the relay closes it.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(30), stream.read_to_end(&mut buf))
        .await
        .expect("relay did not close the connection")
        .unwrap();

    parse_response(&buf).0
}

pub async fn request(addr: SocketAddr, method: &str, path: &str) -> RawResponse {
    let raw = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:5173\r\nConnection: close\r\n\r\n",
        method, path
    );
    send_raw(addr, raw.as_bytes()).await
}

pub async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    request(addr, "GET", path).await
}

/// Reads exactly one Content-Length delimited response off `stream`.
pub async fn read_one(stream: &mut TcpStream) -> RawResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let (resp, _) = parse_response(&buf);
            let length: usize = resp.header("content-length").unwrap().parse().unwrap();
            if buf.len() >= end + 4 + length {
                return parse_response(&buf[..end + 4 + length]).0;
            }
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-response");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn parse_response(buf: &[u8]) -> (RawResponse, usize) {
    let end = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator in response");
    let head = std::str::from_utf8(&buf[..end]).unwrap();
    let mut lines = head.split("\r\n");

    let status = lines
        .next()
        .unwrap()
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse()
        .unwrap();

    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let body = buf[end + 4..].to_vec();
    (RawResponse { status, headers, body }, end + 4)
}
