pub mod browse;
pub mod config;
pub mod get;
pub mod key;
