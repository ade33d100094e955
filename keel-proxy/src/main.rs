//! Keel Proxy Engine
//!
//! Process bootstrap for the dynamic routing proxy: configuration, tracing,
//! the lifecycle control plane, and the HTTP dispatch loop.

#![deny(missing_docs)]

mod config;
mod forward;
mod pool;
mod server;

use std::sync::Arc;

use clap::Parser;
use keel_admin::{ControlPlane, EventBus};
use keel_core::{ChangeKind, Upstreams};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Cli, ProxyConfig};
use crate::pool::EndpointPool;
use crate::server::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ProxyConfig::resolve(&cli)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(listen = %config.listen, domain = %config.domain, "starting keel");

    let registry = Arc::new(Upstreams::new());
    let bus = EventBus::default();

    let plane = ControlPlane::new(Arc::clone(&registry), bus.clone());
    let control_sock = config.control_sock.clone();
    tokio::spawn(async move {
        if let Err(err) = plane.serve(&control_sock).await {
            warn!(error = %err, "control plane stopped");
        }
    });

    let pool = EndpointPool::new();
    spawn_pool_invalidation(&bus, pool.clone());

    let dispatcher = Dispatcher {
        registry,
        pool,
        domain: config.domain.clone(),
    };

    tokio::select! {
        result = server::start_server(config.listen, dispatcher) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}

/// Drop pooled connections to targets the orchestrator removed, so the next
/// request dials fresh instead of reusing a socket to a dead task.
fn spawn_pool_invalidation(bus: &EventBus, pool: EndpointPool) {
    let mut changes = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) if change.kind == ChangeKind::Remove => {
                    let authority =
                        format!("{}:{}", change.target.task_ip, change.target.task_port);
                    pool.purge(&authority);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change events lagged");
                }
                Err(RecvError::Closed) => return,
            }
        }
    });
}
