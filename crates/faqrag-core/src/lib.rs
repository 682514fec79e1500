//! Shared foundation for the faqrag workspace: configuration, the error
//! taxonomy, the embedder/generator capability traits and common types.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
