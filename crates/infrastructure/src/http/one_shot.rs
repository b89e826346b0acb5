use std::io;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

/// Performs exactly one request over an already-dialed connection and hands
/// the connection's driver task to the runtime. There is no pooling client
/// here on purpose: every dialed stream serves a single request, matching
/// the pool's no-keep-alive design.
pub async fn send_request<S>(io: S, request: Request<Full<Bytes>>) -> io::Result<Response<Incoming>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(io);
    let (mut sender, connection) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| io::Error::other(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            tracing::debug!(error = %err, "masquerade connection task ended");
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| io::Error::other(e.to_string()))
}
