//! TCP server.

use crate::auth::{Authorizer, IpGate};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::protocol::{read_frame, write_frame, Response};
use rozsdb_core::Engine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// The RozsDB server.
///
/// Each connection runs on its own task and sends any number of request
/// frames. Requests on one connection are answered in order. Engine calls
/// run on the blocking pool.
///
/// # Example
///
/// ```no_run
/// use rozsdb_core::{Config, Engine};
/// use rozsdb_server::{IpAllowList, RozsServer, ServerConfig, UserPermission, UserRegistry};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(Engine::open(Path::new("data"), Config::default())?);
/// let users = UserRegistry::new().with_user("root", "secret", &[UserPermission::Admin]);
/// let server = Arc::new(RozsServer::new(
///     ServerConfig::default(),
///     engine,
///     Arc::new(users),
///     Arc::new(IpAllowList::new(["127.0.0.1"])),
/// ));
/// server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// # Ok(())
/// # }
/// ```
pub struct RozsServer {
    handler: Arc<RequestHandler>,
    context: Arc<HandlerContext>,
    clients: Arc<Semaphore>,
}

impl RozsServer {
    /// Creates a new server.
    pub fn new(
        config: ServerConfig,
        engine: Arc<Engine>,
        authorizer: Arc<dyn Authorizer>,
        ip_gate: Arc<dyn IpGate>,
    ) -> Self {
        let clients = Arc::new(Semaphore::new(config.max_clients));
        let context = Arc::new(HandlerContext::new(config, engine, authorizer, ip_gate));
        let handler = Arc::new(RequestHandler::new(Arc::clone(&context)));

        Self {
            handler,
            context,
            clients,
        }
    }

    /// Returns the handler context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Number of connections currently admitted.
    pub fn active_clients(&self) -> usize {
        self.context.config.max_clients - self.clients.available_permits()
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.context.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %listener.local_addr()?, "server listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
                () = &mut shutdown => break,
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                server.handle_connection(stream, peer).await;
            });
        }

        info!("server stopped accepting connections");
        Ok(())
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        if !self.context.ip_gate.is_allowed(peer.ip()) {
            warn!(%peer, "rejected connection from disallowed address");
            reject(&mut stream, &ServerError::Forbidden(peer.ip())).await;
            return;
        }

        let Ok(_permit) = Arc::clone(&self.clients).try_acquire_owned() else {
            warn!(%peer, "rejected connection, server is full");
            reject(&mut stream, &ServerError::Full).await;
            return;
        };

        info!(%peer, "client connected");
        match self.serve_client(&mut stream).await {
            Ok(()) => info!(%peer, "client disconnected"),
            Err(e) => warn!(%peer, error = %e, "connection closed"),
        }
    }

    async fn serve_client(&self, stream: &mut TcpStream) -> ServerResult<()> {
        let max_len = self.context.config.max_frame_len;
        loop {
            let payload = match read_frame(stream, max_len).await {
                Ok(Some(payload)) => payload,
                Ok(None) => return Ok(()),
                Err(e @ ServerError::MalformedFrame(_)) => {
                    reject(stream, &e).await;
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            let handler = Arc::clone(&self.handler);
            let response = tokio::task::spawn_blocking(move || handler.handle_frame(&payload))
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "request handler panicked");
                    Response::error("Internal error")
                });
            let frame = match response.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(error = %e, "failed to encode response");
                    Response::error("Internal error").to_frame()?
                }
            };
            write_frame(stream, &frame).await?;
        }
    }
}

/// Sends a final error envelope; the caller then drops the stream.
async fn reject(stream: &mut TcpStream, reason: &ServerError) {
    let response = Response::error(reason.client_message());
    let sent = match response.to_frame() {
        Ok(frame) => write_frame(stream, &frame).await,
        Err(e) => Err(e),
    };
    if let Err(e) = sent {
        debug!(error = %e, "failed to send rejection");
    }
}
