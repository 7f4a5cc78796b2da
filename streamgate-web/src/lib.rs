//! Streamgate Web - HTTP streaming front end
//!
//! Serves the playable file of each managed torrent under
//! `/stream?ep=<info hash>` with byte-range support, and ties engine,
//! registry, adder and server together in [`GatewayClient`].

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod client;
pub mod handlers;
pub mod server;

pub use client::GatewayClient;
pub use server::{AppState, StreamServer, StreamSettings, build_router, stream_url};
