pub mod catalog;
pub mod cli;
pub mod error;
pub mod loader;
pub mod mediators;
pub mod models;
pub mod processors;
pub mod readers;
pub mod settings;
pub mod store;
pub mod utils;
pub mod writers;

pub use error::{ProcessingError, Result};
