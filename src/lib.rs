pub mod config;
pub mod database;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod server;
