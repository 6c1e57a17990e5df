use std::net::{SocketAddr, TcpListener};
use std::thread;

use axum::Router;
use camino::Utf8PathBuf;
use tower_http::services::ServeDir;

use crate::error::ServerError;

/// Bind the HTTP listener, so a taken port fails the caller, then serve
/// `root` from a dedicated thread running a single-threaded runtime.
pub(super) fn start(port: u16, root: Utf8PathBuf) -> Result<(u16, thread::JoinHandle<()>), ServerError> {
    let address = SocketAddr::from(([127, 0, 0, 1], port));
    let bind = |source| ServerError::Bind { port, source };

    let listener = TcpListener::bind(address).map_err(bind)?;
    listener.set_nonblocking(true).map_err(bind)?;
    let port = listener.local_addr().map_err(bind)?.port();

    let thread = thread::Builder::new()
        .name("http".into())
        .spawn(move || {
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .and_then(|rt| rt.block_on(serve(listener, root)));

            if let Err(e) = result {
                tracing::error!("HTTP server stopped: {e}");
            }
        })
        .map_err(ServerError::Spawn)?;

    Ok((port, thread))
}

async fn serve(listener: TcpListener, root: Utf8PathBuf) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::from_std(listener)?;

    let router = Router::new()
        // path to the dev output root
        .fallback_service(ServeDir::new(root.as_std_path()));

    axum::serve(listener, router).await
}
