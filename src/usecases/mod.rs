//! Use Cases Layer - Serving Lifecycle Orchestration
//!
//! Wires endpoint servers and the dynamic metric garbage collector
//! together under one cancellation token.

pub mod garbage_collector;
pub mod supervisor;

pub use garbage_collector::GarbageCollector;
pub use supervisor::{EndpointRole, ServerStatus, ServerSupervisor, SupervisorHandle, Topology};
