//! Mural WebSocket gateway.
//!
//! The gateway serves joining clients a snapshot of the canvas, then relays
//! every pixel delta to all other connected sessions while persisting the
//! affected chunks.

pub mod registry;
pub mod relay;
pub mod server;
pub mod state;

pub use server::start_gateway;
pub use state::GatewayState;
