pub mod cli;
pub mod concourse;
pub mod fly;
pub mod load_config;

pub use cli::{execute, run, Cli, Commands};
