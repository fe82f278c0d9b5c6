pub mod cli;
pub mod load_config;
pub mod state;

pub use cli::{run, run_with_factory, Cli, Commands};
