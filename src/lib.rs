pub mod auth;
pub mod cli;
pub mod earthengine;
pub mod gcs;
mod http;
pub mod load_config;

pub use cli::{run, Cli, Commands};
