//! Core persistence and lifecycle rules for the parcel tracker.
//! This crate owns the `parcel` table and every invariant around it.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogInitError};
pub use model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError};
pub use repo::parcel_store::{ParcelStore, RepoError, RepoResult, SqliteParcelStore};
pub use service::parcel_service::ParcelService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
