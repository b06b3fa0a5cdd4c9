pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ViewList};
pub use commands::run;
