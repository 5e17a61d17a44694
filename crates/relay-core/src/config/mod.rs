//! Configuration store with atomic whole-document reload.
mod error;
pub use error::ConfigError;

mod snapshot;
pub use snapshot::Configuration;

mod store;
pub use store::{ConfigStore, parse_document};
