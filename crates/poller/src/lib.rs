pub mod cli;
pub mod hub_client;
