pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod server;
pub mod storage;
