pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::Settings;

pub use adapters::{EstatClient, LocalStorage, MetadataCache, OllamaAdvisor, TableIndex};
pub use core::{
    etl::EtlEngine,
    pipeline::{StatsDataPipeline, StatsDataRequest},
    translator::QueryTranslator,
};
pub use utils::error::{EstatError, Result};
