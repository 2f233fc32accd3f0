//! Host runtime: config, shape sources, and the join loop that drives a
//! coordinator against the file-backed store.

pub mod config;
mod error;
pub mod paths;
mod runtime;
pub mod shape;

pub use config::HostConfig;
pub use error::HostError;
pub use runtime::{run, shutdown_signal, start_blocking, JoinOptions};
pub use shape::{parse_shape, HostShape, ShapeSpec};
