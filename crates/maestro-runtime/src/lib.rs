//! # maestro-runtime
//!
//! Tool runtime for Maestro. Tools are external capabilities packaged as
//! container images; this crate tracks their lifecycle (install, start,
//! stop), reserves host ports for their workers, and routes method calls
//! to the running workers over HTTP.
//!
//! The container runtime and the worker transport both sit behind traits
//! so the manager can be exercised without Docker.

pub mod driver;
pub mod instance;
pub mod manager;
pub mod registry;
pub mod transport;

pub use driver::{ContainerDriver, DockerDriver, LaunchSpec};
pub use instance::{ToolInstance, ToolState, ToolStatusReport};
pub use manager::{InvocationResponse, ToolRuntime};
pub use registry::{ConfigField, ToolRegistry, ToolSpec};
pub use transport::{HttpWorkerTransport, InvocationRequest, WorkerReply, WorkerTransport};
