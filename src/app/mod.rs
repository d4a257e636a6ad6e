// Use cases composed from core logic and adapters.

pub mod catalog;
pub mod catalog_sync;
pub mod explore;
pub mod metadata_loader;

pub use catalog::CatalogDownloader;
pub use catalog_sync::{update_catalog_and_sync, CatalogSync};
pub use explore::{explore, ExploreReport};
pub use metadata_loader::MetadataLoader;
