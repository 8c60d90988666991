//! Core orchestration engine: the worker agent client, registry, poller and
//! controller that make up the master's control loop.

pub mod agent_client;
pub mod controller;
pub mod poller;
pub mod registry;

pub use agent_client::{AgentClient, AgentError, HttpAgentClient};
pub use controller::Controller;
pub use poller::{refresh_worker, Poller};
pub use registry::WorkerRegistry;
