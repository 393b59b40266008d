//! HTTP + WebSocket shell around the scheduler.
//!
//! Platform adapters (and the test harness) inject normalized messages via
//! `POST /message`, the dashboard polls `GET /stats`, and `GET /ws` streams
//! outbound directives to any subscriber. The gateway never touches
//! scheduler state directly; everything goes through the command handle.

pub mod server;
pub mod types;

pub use server::GatewayServer;
pub use types::IngestMessage;
