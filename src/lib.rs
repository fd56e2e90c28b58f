pub mod config;
pub mod relay;
pub mod routes;
pub mod types;
