//! checkout-hex: order service core (checkout saga) and its inbound HTTP adapter.

pub mod config;
pub mod errors;

pub mod application;

pub use checkout_types::{domain, ports};

pub mod inbound; // HTTP adapter (server + handlers)
