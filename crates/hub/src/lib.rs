//! Status board hub: producer ingest, last-value cache, channel fan-out.

pub mod api;
pub mod auth;
pub mod config;
pub mod derive;
pub mod error;
pub mod relay;
