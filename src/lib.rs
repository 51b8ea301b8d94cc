pub mod cli;
pub mod config;
pub mod engine;
pub mod export;
pub mod http;
pub mod input;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
