pub mod config;
pub mod error;
pub mod file_store;
pub mod logging;
pub mod models;
pub mod path_manager;
pub mod resilience;

pub use error::{Error, ExtractorErrorKind, Result};
pub use file_store::FileStore;
pub use path_manager::PathManager;
