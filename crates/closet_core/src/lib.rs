//! Core catalog logic for Miranda's Closet.
//! This crate is the single source of truth for photo/tag invariants.

pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod worker;

pub use config::CatalogConfig;
pub use events::{CatalogChange, CatalogTable, ChangeBus, Publisher, Subscription};
pub use logging::{default_log_level, init_logging, init_logging_with_config, logging_status};
pub use model::image::{
    filter_by_tag, filter_by_tag_name, Image, ImageId, ImageWithTags, TagWithImages,
};
pub use model::tag::{format_tag_string, normalize_tag, parse_tag_string, Tag, TagId};
pub use repo::{
    CatalogRepository, ImageRepository, RepoError, RepoResult, SqliteCatalogRepository,
    TagRepository,
};
pub use service::catalog_service::{
    CatalogError, CatalogResult, CatalogService, ImportItem, ImportReport,
};
pub use storage::{PhotoStore, StorageError, StorageResult, JPEG_QUALITY};
pub use worker::{CatalogWorker, Completion, WorkerService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
