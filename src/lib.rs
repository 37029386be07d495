pub mod types;
pub mod error;
pub mod config;
pub mod data;
pub mod join;
pub mod bucket;
pub mod label;
pub mod legend;
pub mod processing;
pub mod spatial;
pub mod export;
pub mod render;
pub mod session;
pub mod server;
