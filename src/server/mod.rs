//! Development server.
//!
//! Two parts, each on its own threads:
//!
//! 1. **HTTP**: `axum` serving the dev output root through `tower-http`'s
//!    `ServeDir`, on a current-thread `tokio` runtime.
//! 2. **Live reload**: a `tungstenite` WebSocket endpoint. The pages rendered
//!    in dev mode carry a small script that connects to it and reloads the page
//!    when a `"reload"` message arrives.
//!
//! The server lives for the rest of the process; its threads are never joined.

mod http;
mod reload;

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use camino::Utf8Path;
use console::style;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::watch::Reload;

/// Sends a reload signal to every connected browser.
#[derive(Debug, Clone)]
pub struct ReloadHandle(Sender<()>);

impl Reload for ReloadHandle {
    fn reload(&self) {
        if self.0.send(()).is_err() {
            tracing::warn!("live reload is not running");
        }
    }
}

#[derive(Debug)]
pub struct DevServer {
    http_port: u16,
    reload_port: u16,
    reload: ReloadHandle,
    _threads: Vec<JoinHandle<()>>,
}

impl DevServer {
    /// Start serving `root`. Port `0` picks any free port, the actual ports
    /// are available through [`DevServer::http_port`] and
    /// [`DevServer::reload_port`].
    pub fn start(config: &ServerConfig, root: &Utf8Path) -> Result<Self, ServerError> {
        let (listener, reload_port) = reload::bind(config.reload_port)?;
        let clients = Arc::new(Mutex::new(vec![]));

        let thread_i = reload::new_thread_ws_incoming(listener, clients.clone())?;
        let (tx, thread_o) = reload::new_thread_ws_reload(clients)?;
        let (http_port, thread_http) = http::start(config.http_port, root.to_owned())?;

        tracing::info!(
            url = %style(format!("http://localhost:{http_port}/")).yellow(),
            "serving {root}"
        );

        Ok(Self {
            http_port,
            reload_port,
            reload: ReloadHandle(tx),
            _threads: vec![thread_i, thread_o, thread_http],
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn reload_port(&self) -> u16 {
        self.reload_port
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    pub fn reload(&self) {
        self.reload.reload();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    use camino::Utf8PathBuf;

    use super::*;

    fn ephemeral() -> ServerConfig {
        ServerConfig {
            http_port: 0,
            reload_port: 0,
        }
    }

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn serves_output_root() {
        let (_dir, root) = tempdir();
        std::fs::write(root.join("index.html"), "<p>hello</p>").unwrap();

        let server = DevServer::start(&ephemeral(), &root).unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", server.http_port())).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
            .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("<p>hello</p>"));
    }

    #[test]
    fn pushes_reload_to_clients() {
        let (_dir, root) = tempdir();
        let server = DevServer::start(&ephemeral(), &root).unwrap();

        let url = format!("ws://127.0.0.1:{}", server.reload_port());
        let (mut socket, _) = tungstenite::connect(url).unwrap();

        // the accept thread registers the client asynchronously
        std::thread::sleep(Duration::from_millis(200));
        server.reload();

        let message = socket.read().unwrap();
        assert_eq!(message.to_text().unwrap(), "reload");
    }

    #[test]
    fn taken_port_is_a_bind_error() {
        let (_dir, root) = tempdir();
        let first = DevServer::start(&ephemeral(), &root).unwrap();

        let config = ServerConfig {
            http_port: 0,
            reload_port: first.reload_port(),
        };

        match DevServer::start(&config, &root) {
            Err(ServerError::Bind { port, .. }) => assert_eq!(port, first.reload_port()),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
