//! Routable target models.

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::RegistryError;

/// A single routable task instance backing an application.
///
/// Identifying fields are fixed at insertion time; `weight` is the only field
/// the registry ever rewrites in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Application this instance serves.
    pub app_id: String,
    /// Version identifier assigned by the scheduler.
    pub version_id: String,
    /// Human-readable application version.
    pub app_version: String,
    /// Unique task identifier within the application.
    pub task_id: String,
    /// IP address the task listens on.
    pub task_ip: String,
    /// Port the task listens on.
    pub task_port: u32,
    /// Named port, when the application declares one.
    pub port_name: String,
    /// Relative traffic share consumed by the balancer.
    pub weight: f64,
}

impl Target {
    /// Compose the target's IP and port into a connectable HTTP endpoint.
    ///
    /// A malformed address surfaces as [`RegistryError::MalformedEndpoint`] so
    /// the caller can skip this target instead of tearing down the request.
    pub fn endpoint(&self) -> Result<Url, RegistryError> {
        let raw = format!("http://{}:{}", self.task_ip, self.task_port);
        Url::parse(&raw).map_err(|err| {
            warn!(address = %raw, error = %err, "invalid task endpoint");
            RegistryError::MalformedEndpoint {
                address: raw,
                reason: err.to_string(),
            }
        })
    }
}
