//! Socket gateway: per-packet authentication, the live connection registry,
//! and fire-and-forget fan-out to connected clients.

pub mod auth;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod registry;
pub mod server;
