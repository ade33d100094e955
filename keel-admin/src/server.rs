//! Unix-socket listener for the orchestrator's lifecycle feed.

use std::io;
use std::path::Path;
use std::sync::Arc;

use keel_core::Upstreams;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::bus::EventBus;
use crate::feed::{apply, TaskEvent};

/// Accepts lifecycle-feed connections and drives their notifications into the
/// registry, publishing the resulting change events on the bus.
///
/// The wire format is one JSON-encoded [`TaskEvent`] per line. A malformed
/// line is logged and skipped; it never tears the feed down.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    registry: Arc<Upstreams>,
    bus: EventBus,
}

impl ControlPlane {
    /// Build a control plane driving the given registry and bus.
    pub fn new(registry: Arc<Upstreams>, bus: EventBus) -> Self {
        Self { registry, bus }
    }

    /// Bind the socket and serve connections until the task is dropped.
    ///
    /// A stale socket file left behind by an earlier run is removed before
    /// binding.
    pub async fn serve(self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        info!(socket = %path.display(), "control plane listening");

        loop {
            let (stream, _) = listener.accept().await?;
            let plane = self.clone();
            tokio::spawn(async move {
                plane.handle_connection(stream).await;
            });
        }
    }

    async fn handle_connection(&self, stream: UnixStream) {
        let mut lines = LinesStream::new(BufReader::new(stream).lines());
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "feed connection failed");
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TaskEvent>(&line) {
                Ok(event) => {
                    if let Some(change) = apply(&self.registry, event) {
                        self.bus.publish(change);
                    }
                }
                Err(err) => warn!(error = %err, "discarding malformed feed line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use keel_core::{ChangeKind, Target};
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    use super::*;
    use crate::feed::TaskAction;

    fn make_event(action: TaskAction, task_id: &str, weight: f64) -> TaskEvent {
        TaskEvent {
            action,
            target: Target {
                app_id: "app1".to_string(),
                version_id: "v-1".to_string(),
                app_version: "1.0.0".to_string(),
                task_id: task_id.to_string(),
                task_ip: "10.0.0.1".to_string(),
                task_port: 8080,
                port_name: "web".to_string(),
                weight,
            },
        }
    }

    #[tokio::test]
    async fn feed_lines_mutate_the_registry_and_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("keel.sock");

        let registry = Arc::new(Upstreams::new());
        let bus = EventBus::new(16);
        let mut changes = bus.subscribe();

        let plane = ControlPlane::new(Arc::clone(&registry), bus);
        let server = tokio::spawn(plane.serve(socket.clone()));

        // The listener binds before accepting; retry until the file exists.
        let mut feed = loop {
            match UnixStream::connect(&socket).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };

        let add = serde_json::to_string(&make_event(TaskAction::Add, "t0", 1.0)).unwrap();
        feed.write_all(format!("{add}\n").as_bytes()).await.unwrap();

        let change = timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.kind, ChangeKind::Add);
        assert_eq!(change.target.task_id, "t0");
        assert_eq!(registry.get_target("app1", "t0").unwrap().task_id, "t0");

        server.abort();
    }

    #[tokio::test]
    async fn malformed_lines_do_not_kill_the_feed() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("keel.sock");

        let registry = Arc::new(Upstreams::new());
        let bus = EventBus::new(16);
        let mut changes = bus.subscribe();

        let plane = ControlPlane::new(Arc::clone(&registry), bus);
        let server = tokio::spawn(plane.serve(socket.clone()));

        let mut feed = loop {
            match UnixStream::connect(&socket).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };

        let add = serde_json::to_string(&make_event(TaskAction::Add, "t0", 1.0)).unwrap();
        feed.write_all(format!("this is not json\n{add}\n").as_bytes())
            .await
            .unwrap();

        let change = timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.target.task_id, "t0");

        server.abort();
    }

    #[tokio::test]
    async fn remove_feed_line_drops_the_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("keel.sock");

        let registry = Arc::new(Upstreams::new());
        let bus = EventBus::new(16);
        let mut changes = bus.subscribe();

        let plane = ControlPlane::new(Arc::clone(&registry), bus);
        let server = tokio::spawn(plane.serve(socket.clone()));

        let mut feed = loop {
            match UnixStream::connect(&socket).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };

        let add = serde_json::to_string(&make_event(TaskAction::Add, "t0", 1.0)).unwrap();
        let del = serde_json::to_string(&make_event(TaskAction::Remove, "t0", 1.0)).unwrap();
        feed.write_all(format!("{add}\n{del}\n").as_bytes())
            .await
            .unwrap();

        let first = timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.kind, ChangeKind::Add);
        let second = timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.kind, ChangeKind::Remove);
        assert!(registry.is_empty());

        server.abort();
    }
}
