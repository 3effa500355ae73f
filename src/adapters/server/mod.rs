//! HTTP(S) Scrape Endpoints
//!
//! One `EndpointServer` per listener. Routing is a single path per
//! server; the handler is either the Prometheus scrape or the dummy
//! 200-only responder.

pub mod endpoint;
pub mod handlers;

pub use endpoint::{EndpointServer, ServerState, SHUTDOWN_GRACE};
