use crate::adapters::estat::{EstatClient, StatsListQuery};
use crate::adapters::sqlite::MetadataCache;
use crate::domain::model::{StatsTable, TableMetadata};
use crate::utils::error::Result;

const PRIORITY_KEYWORDS: &[&str] = &["人口", "労働", "世帯", "家計", "国勢"];
const MAX_PRIORITY_TABLES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub tables_saved: usize,
    pub metadata_saved: usize,
    pub failures: Vec<String>,
}

/// Fills the metadata cache from the e-Stat API.
pub struct MetadataLoader {
    client: EstatClient,
    cache: MetadataCache,
}

fn is_priority(table: &StatsTable) -> bool {
    PRIORITY_KEYWORDS
        .iter()
        .any(|k| table.stat_name.contains(k) || table.title.contains(k))
}

impl MetadataLoader {
    pub fn new(client: EstatClient, cache: MetadataCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub async fn fetch_all_stats_tables(&self, limit: usize) -> Result<Vec<StatsTable>> {
        self.client
            .get_all_stats_list(&StatsListQuery::default(), limit)
            .await
    }

    pub async fn fetch_table_metadata(&self, table_id: &str) -> Result<TableMetadata> {
        self.client.get_meta_info(table_id).await
    }

    /// Stores the table list, then axes for the first priority tables.
    /// A table whose metadata cannot be fetched is logged and skipped.
    pub async fn update_metadata_cache(&self, max_tables: usize) -> Result<RefreshReport> {
        tracing::info!("🔄 e-stat メタデータキャッシュを更新中...");
        let mut report = RefreshReport::default();

        let tables = self.fetch_all_stats_tables(max_tables).await?;
        if !tables.is_empty() {
            report.tables_saved = self.cache.save_stats_tables(&tables)?;
        }

        let priority: Vec<&StatsTable> = tables
            .iter()
            .filter(|t| is_priority(t))
            .take(MAX_PRIORITY_TABLES)
            .collect();
        tracing::info!("🎯 優先統計表 {}件のメタデータを取得中...", priority.len());

        for (i, table) in priority.iter().enumerate() {
            tracing::debug!("  {}/{}: {}", i + 1, priority.len(), table.table_id);
            let saved = match self.fetch_table_metadata(&table.table_id).await {
                Ok(metadata) => self.cache.save_table_metadata(&metadata),
                Err(e) => Err(e),
            };
            match saved {
                Ok(()) => report.metadata_saved += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping metadata for {}: {}", table.table_id, e);
                    report.failures.push(table.table_id.clone());
                }
            }
        }

        tracing::info!(
            "✅ メタデータキャッシュの更新が完了しました ({} tables, {} with axes)",
            report.tables_saved,
            report.metadata_saved
        );
        Ok(report)
    }
}
