//! In-process HTTP endpoints standing in for proxies, echo services and list hosts

#![allow(dead_code)]

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const SELF_IP: &str = "203.0.113.7";
pub const OTHER_IP: &str = "198.51.100.1";

/// How the mock answers every request it receives
#[derive(Clone)]
pub enum Behavior {
    Respond {
        status: u16,
        content_type: &'static str,
        body: String,
        delay: Duration,
    },
    /// Accept, read the request, never answer
    Hang,
}

impl Behavior {
    pub fn json(body: impl Into<String>) -> Self {
        Behavior::Respond {
            status: 200,
            content_type: "application/json",
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// Echo endpoint reporting `origin`
    pub fn origin(ip: &str) -> Self {
        Self::json(origin_body(ip))
    }

    pub fn text(body: impl Into<String>) -> Self {
        Behavior::Respond {
            status: 200,
            content_type: "text/plain",
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Behavior::Respond {
            status,
            content_type: "text/plain",
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_content_type(mut self, value: &'static str) -> Self {
        if let Behavior::Respond { content_type, .. } = &mut self {
            *content_type = value;
        }
        self
    }

    pub fn with_delay(mut self, value: Duration) -> Self {
        if let Behavior::Respond { delay, .. } = &mut self {
            *delay = value;
        }
        self
    }
}

/// A running mock endpoint
pub struct MockServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let behavior = behavior.clone();
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let _ = serve(stream, behavior, counter).await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `http://127.0.0.1:<port><path>`
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Requests received so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A loopback port with nothing listening
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Read up to the end of the request head; `None` when the peer hung up first
async fn read_head(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        request.extend_from_slice(&buf[..n]);
    }
    Ok(Some(request))
}

async fn respond(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn origin_body(ip: &str) -> String {
    format!(r#"{{"origin": "{}"}}"#, ip)
}

async fn serve(
    mut stream: TcpStream,
    behavior: Behavior,
    hits: Arc<AtomicUsize>,
) -> std::io::Result<()> {
    let Some(request) = read_head(&mut stream).await? else {
        return Ok(());
    };
    hits.fetch_add(1, Ordering::SeqCst);

    if request.starts_with(b"CONNECT ") {
        stream
            .write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n")
            .await?;
        return stream.shutdown().await;
    }

    match behavior {
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
        Behavior::Respond {
            status,
            content_type,
            body,
            delay,
        } => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            respond(&mut stream, status, content_type, &body).await
        }
    }
}

/// HTTP proxy answering plain requests with an echo of `origin` and splicing
/// every CONNECT through to `upstream`, whatever authority was asked for
pub struct TunnelProxy {
    pub addr: SocketAddr,
    connects: Arc<Mutex<Vec<String>>>,
}

impl TunnelProxy {
    pub async fn start(origin: &str, upstream: SocketAddr) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connects = Arc::new(Mutex::new(Vec::new()));
        let body = origin_body(origin);

        let log = Arc::clone(&connects);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let body = body.clone();
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve_tunnel(stream, body, upstream, log).await;
                });
            }
        });

        Self { addr, connects }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Authorities requested through CONNECT so far
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

async fn serve_tunnel(
    mut stream: TcpStream,
    body: String,
    upstream: SocketAddr,
    connects: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let Some(request) = read_head(&mut stream).await? else {
        return Ok(());
    };

    if !request.starts_with(b"CONNECT ") {
        return respond(&mut stream, 200, "application/json", &body).await;
    }

    let head = String::from_utf8_lossy(&request);
    let authority = head.split_whitespace().nth(1).unwrap_or_default().to_string();
    connects.lock().unwrap().push(authority);

    let mut far_end = TcpStream::connect(upstream).await?;
    stream
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await?;
    tokio::io::copy_bidirectional(&mut stream, &mut far_end).await?;
    Ok(())
}

/// Records the first chunk a client sends, then hangs up
pub struct ByteSink {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<u8>>>,
}

impl ByteSink {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let store = Arc::clone(&received);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                if let Ok(n) = stream.read(&mut buf).await {
                    store.lock().unwrap().extend_from_slice(&buf[..n]);
                }
            }
        });

        Self { addr, received }
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

/// Destination requested by a SOCKS client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksTarget {
    pub version: u8,
    /// SOCKS5 address type (1 IPv4, 3 domain name, 4 IPv6); 1 or 3 for SOCKS4/4a
    pub address_type: u8,
    pub host: String,
    pub port: u16,
}

/// SOCKS4/SOCKS5 proxy that grants every CONNECT and then answers the
/// tunnelled HTTP request itself with an echo of `origin`
pub struct SocksProxy {
    pub addr: SocketAddr,
    targets: Arc<Mutex<Vec<SocksTarget>>>,
}

impl SocksProxy {
    pub async fn start(origin: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let targets = Arc::new(Mutex::new(Vec::new()));
        let body = origin_body(origin);

        let log = Arc::clone(&targets);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let body = body.clone();
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve_socks(stream, body, log).await;
                });
            }
        });

        Self { addr, targets }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn targets(&self) -> Vec<SocksTarget> {
        self.targets.lock().unwrap().clone()
    }
}

async fn read_until_nul(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    loop {
        match stream.read_u8().await? {
            0 => return Ok(bytes),
            b => bytes.push(b),
        }
    }
}

async fn serve_socks(
    mut stream: TcpStream,
    body: String,
    targets: Arc<Mutex<Vec<SocksTarget>>>,
) -> std::io::Result<()> {
    let target = match stream.read_u8().await? {
        5 => {
            let methods = stream.read_u8().await?;
            let mut offered = vec![0u8; methods as usize];
            stream.read_exact(&mut offered).await?;
            stream.write_all(&[5, 0]).await?;

            // VER CMD RSV ATYP
            let mut head = [0u8; 4];
            stream.read_exact(&mut head).await?;
            let host = match head[3] {
                1 => {
                    let mut ip = [0u8; 4];
                    stream.read_exact(&mut ip).await?;
                    Ipv4Addr::from(ip).to_string()
                }
                3 => {
                    let len = stream.read_u8().await?;
                    let mut name = vec![0u8; len as usize];
                    stream.read_exact(&mut name).await?;
                    String::from_utf8_lossy(&name).into_owned()
                }
                4 => {
                    let mut ip = [0u8; 16];
                    stream.read_exact(&mut ip).await?;
                    Ipv6Addr::from(ip).to_string()
                }
                _ => return Ok(()),
            };
            let port = stream.read_u16().await?;
            stream.write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]).await?;

            SocksTarget {
                version: 5,
                address_type: head[3],
                host,
                port,
            }
        }
        4 => {
            let _command = stream.read_u8().await?;
            let port = stream.read_u16().await?;
            let mut ip = [0u8; 4];
            stream.read_exact(&mut ip).await?;
            let _user = read_until_nul(&mut stream).await?;

            // 0.0.0.x marks SOCKS4a, with the host name after the user id
            let (address_type, host) = if ip[..3] == [0, 0, 0] && ip[3] != 0 {
                let name = read_until_nul(&mut stream).await?;
                (3, String::from_utf8_lossy(&name).into_owned())
            } else {
                (1, Ipv4Addr::from(ip).to_string())
            };
            stream.write_all(&[0, 0x5A, 0, 0, 0, 0, 0, 0]).await?;

            SocksTarget {
                version: 4,
                address_type,
                host,
                port,
            }
        }
        _ => return Ok(()),
    };
    targets.lock().unwrap().push(target);

    if read_head(&mut stream).await?.is_none() {
        return Ok(());
    }
    respond(&mut stream, 200, "application/json", &body).await
}
