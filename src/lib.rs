pub mod car;
pub mod config;
pub mod messages;
pub mod runtime;
