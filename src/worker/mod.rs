//! The computation boundary: a dedicated engine thread driven by messages.

pub mod engine;
pub mod host;
pub mod protocol;

pub use engine::Engine;
pub use host::{HostConfig, WorkerError, WorkerHost};
pub use protocol::{
    CheckRequest, ExactRequest, ExactResponse, Request, Response, SimulationRequest,
    SimulationResponse,
};
