//! Backends that talk to something outside the process.
//!
//! | role        | identifier | type                |
//! |-------------|------------|---------------------|
//! | queue       | `spool`    | [`SpoolQueue`]      |
//! | heartbeater | `http`     | [`HttpHeartbeater`] |
//! | uploader    | `local`    | [`LocalUploader`]   |
//! | downloader  | `local`    | [`LocalDownloader`] |
mod error;
pub use error::TransportError;

pub mod http;
pub use http::HttpHeartbeater;

pub mod local;
pub use local::{LocalDownloader, LocalUploader};

pub mod spool;
pub use spool::SpoolQueue;

use relay_core::{backend::BackendRegistry, registry::RegistryError};

/// Register every backend of this crate.
pub fn register_transport_backends(reg: &mut BackendRegistry) -> Result<(), RegistryError> {
    reg.queues_mut().register_fn(SpoolQueue::NAME, spool::create)?;
    reg.heartbeaters_mut()
        .register_fn(HttpHeartbeater::NAME, http::create)?;
    reg.uploaders_mut()
        .register_fn(LocalUploader::NAME, local::create_uploader)?;
    reg.downloaders_mut()
        .register_fn(LocalDownloader::NAME, local::create_downloader)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_alongside_memory_backends() {
        let mut reg = BackendRegistry::with_memory_backends().unwrap();
        register_transport_backends(&mut reg).unwrap();

        assert_eq!(reg.queues().identifiers(), ["memory", "spool"]);
        assert_eq!(reg.heartbeaters().identifiers(), ["http", "memory"]);
        assert_eq!(reg.uploaders().identifiers(), ["local", "memory"]);
        assert_eq!(reg.downloaders().identifiers(), ["local", "memory"]);

        assert!(register_transport_backends(&mut reg).is_err());
    }
}
