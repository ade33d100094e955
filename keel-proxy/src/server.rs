//! HTTP listener and request dispatch.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use keel_core::Upstreams;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::forward;
use crate::pool::EndpointPool;

/// Everything the dispatch path needs to resolve and forward one request.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// The routing registry fed by the control plane.
    pub registry: Arc<Upstreams>,
    /// Cached upstream connections.
    pub pool: EndpointPool,
    /// Serving domain stripped from request hosts to obtain app ids.
    pub domain: String,
}

/// Response body: a relayed upstream body or a small generated page.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Starts the proxy listener on the given address.
pub async fn start_server(addr: SocketAddr, dispatcher: Dispatcher) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "proxy listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        tokio::task::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let dispatcher = dispatcher.clone();
                async move { handle_request(req, dispatcher).await }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%peer, error = %err, "connection ended with error");
            }
        });
    }
}

/// Resolve the request's application and relay it to one of the
/// application's targets.
async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Dispatcher,
) -> Result<Response<ProxyBody>, Infallible> {
    let Some(host) = request_host(&req) else {
        return Ok(text_response(StatusCode::BAD_REQUEST, "missing Host header"));
    };
    let Some(app_id) = app_id_for_host(&host, &dispatcher.domain) else {
        return Ok(text_response(StatusCode::BAD_REQUEST, "unroutable host"));
    };

    // A miss here is the expected answer when every task of the app is gone.
    let Some(target) = dispatcher.registry.next_target(&app_id) else {
        debug!(app_id, "no eligible backend");
        return Ok(text_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no eligible backend",
        ));
    };

    match forward::forward(req, &target, &dispatcher.pool).await {
        Ok(response) => Ok(response.map(BodyExt::boxed)),
        Err(err) => {
            warn!(app_id, task_id = %target.task_id, error = %err, "forwarding failed");
            Ok(text_response(StatusCode::BAD_GATEWAY, "upstream unreachable"))
        }
    }
}

fn request_host(req: &Request<Incoming>) -> Option<String> {
    if let Some(value) = req.headers().get(header::HOST) {
        return value.to_str().ok().map(str::to_string);
    }
    req.uri().host().map(str::to_string)
}

/// Derive the application id from a request host.
///
/// `myapp.<domain>` maps to `myapp`; a host outside the serving domain is
/// used verbatim, which lets callers address applications directly.
pub fn app_id_for_host(host: &str, domain: &str) -> Option<String> {
    let host = host
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    let suffix = format!(".{}", domain.to_ascii_lowercase());
    match host.strip_suffix(&suffix) {
        Some(app) if !app.is_empty() => Some(app.to_string()),
        _ => Some(host),
    }
}

fn text_response(status: StatusCode, message: &'static str) -> Response<ProxyBody> {
    let body = Full::new(Bytes::from_static(message.as_bytes()))
        .map_err(|never| match never {})
        .boxed();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}
