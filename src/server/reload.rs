use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tungstenite::WebSocket;

use crate::error::ServerError;

/// Open browser tabs kept at most.
const MAX_CLIENTS: usize = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub(super) fn bind(port: u16) -> Result<(TcpListener, u16), ServerError> {
    let address = SocketAddr::from(([127, 0, 0, 1], port));
    let bind = |source| ServerError::Bind { port, source };

    let listener = TcpListener::bind(address).map_err(bind)?;
    let port = listener.local_addr().map_err(bind)?.port();
    Ok((listener, port))
}

/// Accept WebSocket clients as they connect.
pub(super) fn new_thread_ws_incoming(
    server: TcpListener,
    clients: Clients,
) -> Result<JoinHandle<()>, ServerError> {
    thread::Builder::new()
        .name("reload-accept".into())
        .spawn(move || {
            for stream in server.incoming() {
                let socket = match stream {
                    Ok(stream) => tungstenite::accept(stream),
                    Err(e) => {
                        tracing::warn!("reload client failed to connect: {e}");
                        continue;
                    }
                };

                match socket {
                    Ok(socket) => clients
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(socket),
                    Err(e) => tracing::warn!("reload handshake failed: {e}"),
                }
            }
        })
        .map_err(ServerError::Spawn)
}

/// Broadcast `"reload"` to every client each time a signal arrives.
pub(super) fn new_thread_ws_reload(
    clients: Clients,
) -> Result<(Sender<()>, JoinHandle<()>), ServerError> {
    let (tx, rx) = channel();

    let thread = thread::Builder::new()
        .name("reload-send".into())
        .spawn(move || {
            while rx.recv().is_ok() {
                let mut clients = clients.lock().unwrap_or_else(PoisonError::into_inner);
                broadcast(&mut clients);
            }
        })
        .map_err(ServerError::Spawn)?;

    Ok((tx, thread))
}

fn broadcast(clients: &mut Vec<WebSocket<TcpStream>>) {
    let mut broken = vec![];

    for (i, socket) in clients.iter_mut().enumerate() {
        match socket.send("reload".into()) {
            Ok(_) => {}
            Err(tungstenite::Error::Io(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                broken.push(i);
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                broken.push(i);
            }
            Err(e) => tracing::error!("couldn't notify reload client: {e}"),
        }
    }

    for i in broken.into_iter().rev() {
        clients.remove(i);
    }

    // Close all but the most recent connections
    let len = clients.len();
    if len > MAX_CLIENTS {
        for mut socket in clients.drain(0..len - MAX_CLIENTS) {
            socket.close(None).ok();
        }
    }

    tracing::debug!("reload sent to {} clients", clients.len());
}
