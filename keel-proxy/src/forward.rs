//! Forwarding a request to the resolved target.

use anyhow::Context;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use keel_core::Target;
use tokio::net::TcpStream;
use tracing::debug;

use crate::pool::EndpointPool;

/// Send the request to the target, reusing a pooled connection when one is
/// available.
///
/// A target whose endpoint does not materialize, or that cannot be reached,
/// surfaces as an error the dispatch layer turns into a 502 — never a crash.
pub async fn forward(
    req: Request<Incoming>,
    target: &Target,
    pool: &EndpointPool,
) -> anyhow::Result<Response<Incoming>> {
    let url = target.endpoint()?;
    let host = url.host_str().context("endpoint without host")?;
    let port = url.port_or_known_default().unwrap_or(80);
    let authority = format!("{host}:{port}");

    let mut sender = match pool.checkout(&authority) {
        Some(sender) => sender,
        None => connect(&authority).await?,
    };
    if sender.ready().await.is_err() {
        // The pooled connection died while parked; dial a fresh one.
        sender = connect(&authority).await?;
        sender
            .ready()
            .await
            .with_context(|| format!("upstream {authority} not ready"))?;
    }

    let response = sender
        .send_request(req)
        .await
        .with_context(|| format!("forwarding to {authority}"))?;
    pool.checkin(&authority, sender);
    Ok(response)
}

async fn connect(authority: &str) -> anyhow::Result<http1::SendRequest<Incoming>> {
    let stream = TcpStream::connect(authority)
        .await
        .with_context(|| format!("connecting to {authority}"))?;
    let (sender, connection) = http1::handshake(TokioIo::new(stream)).await?;

    // The spawned task owns the socket until the peer or the sender goes
    // away.
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!(error = %err, "upstream connection closed");
        }
    });
    Ok(sender)
}
