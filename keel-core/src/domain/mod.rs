//! Domain models: routable targets and the upstreams that own them.

pub mod target;
pub mod upstream;
