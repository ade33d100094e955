//! Keel Admin Control Plane
//!
//! The lifecycle feed between the orchestrator and the routing core: task
//! scheduling notifications arrive over a Unix socket, mutate the upstream
//! registry, and fan out as change events to downstream listeners.

pub mod bus;
pub mod feed;
pub mod server;

pub use bus::EventBus;
pub use feed::{apply, TaskAction, TaskEvent};
pub use server::ControlPlane;
