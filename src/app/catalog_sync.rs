//! Loads the latest combined catalog CSV into the translator index.

use crate::adapters::sqlite::TableIndex;
use crate::app::catalog::CatalogDownloader;
use crate::core::knowledge;
use crate::domain::model::IndexedTable;
use crate::utils::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The columns of a combined catalog row the index needs.
#[derive(Debug, Deserialize)]
struct CombinedCatalogRow {
    #[serde(rename = "TABLE_INF", default)]
    table_id: String,
    #[serde(rename = "STAT_NAME", default)]
    stat_name: String,
    #[serde(rename = "TITLE", default)]
    title: String,
    #[serde(rename = "GOV_ORG", default)]
    gov_org: String,
    #[serde(rename = "FIELD_CODE", default)]
    field_code: String,
    #[serde(rename = "FIELD_NAME", default)]
    field_name: String,
}

impl From<CombinedCatalogRow> for IndexedTable {
    fn from(row: CombinedCatalogRow) -> Self {
        IndexedTable {
            keywords: knowledge::extract_catalog_keywords(&row.stat_name, &row.title),
            stats_data_id: row.table_id,
            table_name: row.stat_name,
            description: row.title,
            organization: row.gov_org,
            field_code: row.field_code,
            field_name: row.field_name,
            ..Default::default()
        }
    }
}

pub struct CatalogSync {
    catalog_dir: PathBuf,
    index: TableIndex,
}

fn is_combined_catalog(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".csv") && name.contains("_combined_")
}

/// Most recently modified `*_combined_*.csv` in `dir`.
pub fn latest_combined_catalog(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_combined_catalog(&path) {
            continue;
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        if latest.as_ref().map_or(true, |(time, _)| modified > *time) {
            latest = Some((modified, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}

fn read_combined_catalog(path: &Path) -> Result<Vec<IndexedTable>> {
    let content = std::fs::read_to_string(path)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut tables = Vec::new();
    for row in reader.deserialize::<CombinedCatalogRow>() {
        let row = row?;
        if row.table_id.is_empty() {
            continue;
        }
        tables.push(row.into());
    }
    Ok(tables)
}

impl CatalogSync {
    pub fn new(catalog_dir: impl Into<PathBuf>, index: TableIndex) -> Self {
        Self {
            catalog_dir: catalog_dir.into(),
            index,
        }
    }

    /// Returns the number of rows synced; 0 when no combined catalog exists.
    pub fn sync_catalog_to_index(&self) -> Result<usize> {
        let Some(path) = latest_combined_catalog(&self.catalog_dir)? else {
            tracing::warn!(
                "⚠️ No combined catalog in {}; run `catalog download` first",
                self.catalog_dir.display()
            );
            return Ok(0);
        };

        tracing::info!("カタログファイルを読み込み中: {}", path.display());
        let tables = read_combined_catalog(&path)?;
        let synced = self.index.upsert(&tables)?;
        tracing::info!("データベースに {} 件のデータを同期しました", synced);
        Ok(synced)
    }
}

/// Download, classify and save a fresh catalog, then sync it into the index.
pub async fn update_catalog_and_sync(
    downloader: &CatalogDownloader,
    sync: &CatalogSync,
    limit: usize,
) -> Result<usize> {
    tracing::info!("=== カタログの更新開始 ===");
    let tables = downloader.download_all(limit).await?;
    if tables.is_empty() {
        tracing::warn!("カタログデータを取得できませんでした");
        return Ok(0);
    }

    let catalogs = downloader.classify(&tables);
    downloader.save_catalogs(&catalogs)?;

    tracing::info!("=== インデックスへの同期開始 ===");
    sync.sync_catalog_to_index()
}
