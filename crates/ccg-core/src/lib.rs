//! CCG Core — error taxonomy and configuration shared by the consent crates.

pub mod config;
pub mod error;

pub use config::{ConsentConfig, DataPaths, StorageBackend};
pub use error::{Error, Result};
