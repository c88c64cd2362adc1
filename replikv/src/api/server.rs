//! HTTP server setup and connection handling.

use super::router;
use super::state::AppState;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use replikv_cluster::{MembershipManager, Store};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Client HTTP API server.
pub struct ApiServer {
    /// Shared application state.
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(store: Arc<Store>, membership: Arc<MembershipManager>) -> Self {
        Self {
            state: Arc::new(AppState::new(store, membership)),
        }
    }

    /// Serve connections from `listener` until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: oneshot::Receiver<()>,
    ) -> io::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "API server started");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { router::route(req, state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            if !e.is_incomplete_message() {
                                tracing::warn!(
                                    remote = %remote_addr,
                                    error = %e,
                                    "HTTP connection error"
                                );
                            }
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("API server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
