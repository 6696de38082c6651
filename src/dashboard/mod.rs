//! Web dashboard.
//!
//! A small HTTP/1.1 server on a std `TcpListener` exposing start/stop controls
//! and the latest session results:
//!
//! - `GET /` dashboard page
//! - `GET /status` JSON snapshot
//! - `GET /frame.jpg` latest annotated frame
//! - `POST /start`, `POST /stop` session control (303 back to `/`)
//! - `GET /health`

mod page;
pub mod session;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub use session::{
    DashboardSink, DashboardSnapshot, SessionController, SourceFactory, STOPPED_MESSAGE,
};

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub addr: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8501".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct DashboardHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl DashboardHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("dashboard server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct DashboardServer {
    cfg: DashboardConfig,
    controller: Arc<SessionController>,
}

impl DashboardServer {
    pub fn new(cfg: DashboardConfig, controller: Arc<SessionController>) -> Self {
        Self { cfg, controller }
    }

    pub fn spawn(self) -> Result<DashboardHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "dashboard configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let controller = self.controller.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_server(listener, &controller, shutdown_thread) {
                log::error!("dashboard server stopped: {}", err);
            }
        });

        Ok(DashboardHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    controller: &SessionController,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, controller) {
                    log::warn!("dashboard request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, controller: &SessionController) -> Result<()> {
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        return write_response(&mut stream, &Response::json(403, r#"{"error":"forbidden"}"#));
    }
    let request = read_request(&mut stream)?;
    let response = route(&request, controller)?;
    write_response(&mut stream, &response)
}

/// Map a parsed request to a response.
pub fn route(request: &HttpRequest, controller: &SessionController) -> Result<Response> {
    let method = request.method.as_str();
    let response = match (method, request.path.as_str()) {
        ("GET", "/health") => Response::json(200, r#"{"status":"ok"}"#),
        ("GET", "/") => {
            let snapshot = controller.snapshot()?;
            Response::new(
                200,
                "text/html; charset=utf-8",
                page::render(&snapshot).into_bytes(),
            )
        }
        ("GET", "/status") => {
            let snapshot = controller.snapshot()?;
            Response::new(200, "application/json", serde_json::to_vec(&snapshot)?)
        }
        ("GET", "/frame.jpg") => match controller.latest_jpeg()? {
            Some(jpeg) => Response::new(200, "image/jpeg", jpeg),
            None => Response::json(404, r#"{"error":"no_frame"}"#),
        },
        ("POST", "/start") => {
            if !controller.start()? {
                log::info!("start ignored: detection already running");
            }
            Response::redirect("/")
        }
        ("POST", "/stop") => {
            controller.stop()?;
            Response::redirect("/")
        }
        (_, "/health" | "/" | "/status" | "/frame.jpg" | "/start" | "/stop") => {
            Response::json(405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => Response::json(404, r#"{"error":"not_found"}"#),
    };
    Ok(response)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub location: Option<&'static str>,
}

impl Response {
    pub fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            location: None,
        }
    }

    fn json(status: u16, body: &str) -> Self {
        Self::new(status, "application/json", body.as_bytes().to_vec())
    }

    fn redirect(location: &'static str) -> Self {
        Self {
            status: 303,
            content_type: "text/plain",
            body: Vec::new(),
            location: Some(location),
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    HttpRequest::parse(&String::from_utf8_lossy(&data))
}

fn write_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let status_line = match response.status {
        200 => "HTTP/1.1 200 OK",
        303 => "HTTP/1.1 303 See Other",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let location = response
        .location
        .map(|loc| format!("Location: {loc}\r\n"))
        .unwrap_or_default();
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\n{location}Cache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = response.content_type,
        len = response.body.len(),
        location = location,
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&response.body)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.split("\r\n");
        let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
        let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                headers.insert(k.trim().to_lowercase(), v.trim().to_string());
            }
        }
        let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
        Ok(Self {
            method: method.to_string(),
            path,
            headers,
        })
    }
}
