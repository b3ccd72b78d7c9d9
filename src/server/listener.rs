use super::RequestHandler;
use anyhow::{Context, Result};
use hyper::Request;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub struct Listener {
    address: SocketAddr,
    handler: Arc<RequestHandler>,
}

impl Listener {
    pub fn new(address: SocketAddr, handler: Arc<RequestHandler>) -> Self {
        Self { address, handler }
    }

    pub async fn serve(&self) -> Result<()> {
        let listener = TcpListener::bind(self.address)
            .await
            .with_context(|| format!("Failed to bind to {}", self.address))?;

        info!("Listening on {} (http)", self.address);

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                Self::serve_connection(io, remote_addr, handler).await;
            });
        }
    }

    async fn serve_connection<I>(io: I, remote_addr: SocketAddr, handler: Arc<RequestHandler>)
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let handler = Arc::clone(&handler);
            async move { Ok::<_, Infallible>(handler.handle(req).await) }
        });

        // Auto-detect HTTP/1 or HTTP/2 (h2c)
        let builder = AutoBuilder::new(TokioExecutor::new());
        if let Err(e) = builder.serve_connection(io, service).await {
            debug!("Connection error from {}: {}", remote_addr, e);
        }
    }
}
