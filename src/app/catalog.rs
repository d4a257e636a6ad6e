//! Downloads the e-Stat statistics catalog and saves it per major field.

use crate::adapters::estat::{EstatClient, StatsListQuery};
use crate::core::classify::{self, CatalogIndexEntry, FieldCatalogs};
use crate::domain::model::StatsTable;
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Fields whose catalog is narrowed to one survey.
const FIELD_STATS_CODES: &[(&str, &str)] = &[
    ("01", "00200521"), // 国勢調査
    ("03", "00450011"), // 労働力調査
    ("07", "00200553"), // 家計調査
];

#[derive(Debug, Serialize)]
struct FieldSummary {
    name: String,
    record_count: usize,
    organizations: Vec<String>,
    survey_years: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CatalogSummary {
    download_date: String,
    total_records: usize,
    field_summary: BTreeMap<String, FieldSummary>,
}

/// Files written by one `save_catalogs` call.
#[derive(Debug, Clone, Default)]
pub struct SavedCatalogs {
    pub field_files: Vec<PathBuf>,
    pub combined: Option<PathBuf>,
    pub summary: PathBuf,
}

pub struct CatalogDownloader {
    client: EstatClient,
    output_dir: PathBuf,
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn bom_csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;
    Ok(csv::Writer::from_writer(file))
}

fn summarize(tables: &[StatsTable], field_code: &str) -> FieldSummary {
    let mut organizations: Vec<String> = Vec::new();
    for table in tables {
        if !organizations.contains(&table.gov_org) {
            organizations.push(table.gov_org.clone());
        }
    }

    let mut survey_years: Vec<String> = tables
        .iter()
        .filter(|t| !t.survey_date.is_empty())
        .map(|t| t.survey_date.clone())
        .collect();
    survey_years.sort();
    survey_years.dedup();

    FieldSummary {
        name: classify::field_name(field_code).to_string(),
        record_count: tables.len(),
        organizations,
        survey_years,
    }
}

impl CatalogDownloader {
    pub fn new(client: EstatClient, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn download_all(&self, limit: usize) -> Result<Vec<StatsTable>> {
        tracing::info!("📥 Downloading up to {} catalog entries", limit);
        let tables = self
            .client
            .get_all_stats_list(&StatsListQuery::default(), limit)
            .await?;
        tracing::info!("取得完了: {}件の統計表", tables.len());
        Ok(tables)
    }

    pub async fn download_by_field(&self, field_code: &str, limit: usize) -> Result<Vec<StatsTable>> {
        let query = FIELD_STATS_CODES
            .iter()
            .find(|(code, _)| *code == field_code)
            .map(|(_, stats_code)| StatsListQuery::for_stats_code(stats_code))
            .unwrap_or_default();

        tracing::info!(
            "📥 Downloading field {} ({})",
            field_code,
            classify::field_name(field_code)
        );
        let tables = self.client.get_all_stats_list(&query, limit).await?;
        tracing::info!("分野 {}: {}件", field_code, tables.len());
        Ok(tables)
    }

    pub fn classify(&self, tables: &[StatsTable]) -> FieldCatalogs {
        classify::classify_by_field(tables)
    }

    /// Per-field CSVs, one combined CSV and a JSON summary, all stamped with the current time.
    pub fn save_catalogs(&self, catalogs: &FieldCatalogs) -> Result<SavedCatalogs> {
        std::fs::create_dir_all(&self.output_dir)?;
        let stamp = timestamp();
        let mut saved = SavedCatalogs::default();

        for (field_code, tables) in catalogs {
            let path = self.output_dir.join(format!(
                "{}_{}_{}.csv",
                field_code,
                classify::field_name(field_code),
                stamp
            ));
            let mut writer = bom_csv_writer(&path)?;
            writer.write_record(StatsTable::CSV_HEADERS)?;
            for table in tables {
                writer.write_record(table.csv_fields())?;
            }
            writer.flush()?;
            tracing::info!("保存: {} ({}件)", path.display(), tables.len());
            saved.field_files.push(path);
        }

        if !catalogs.is_empty() {
            let path = self
                .output_dir
                .join(format!("estat_catalog_combined_{}.csv", stamp));
            let mut writer = bom_csv_writer(&path)?;
            writer.write_record(
                StatsTable::CSV_HEADERS
                    .iter()
                    .chain(["FIELD_CODE", "FIELD_NAME"].iter()),
            )?;
            let mut count = 0;
            for (field_code, tables) in catalogs {
                let field_name = classify::field_name(field_code);
                for table in tables {
                    let mut record = table.csv_fields();
                    record.push(field_code.clone());
                    record.push(field_name.to_string());
                    writer.write_record(&record)?;
                    count += 1;
                }
            }
            writer.flush()?;
            tracing::info!("統合ファイル保存: {} ({}件)", path.display(), count);
            saved.combined = Some(path);
        }

        let summary = CatalogSummary {
            download_date: chrono::Local::now().to_rfc3339(),
            total_records: catalogs.values().map(Vec::len).sum(),
            field_summary: catalogs
                .iter()
                .map(|(code, tables)| (code.clone(), summarize(tables, code)))
                .collect(),
        };
        let path = self
            .output_dir
            .join(format!("catalog_summary_{}.json", stamp));
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        tracing::info!("サマリー保存: {}", path.display());
        saved.summary = path;

        Ok(saved)
    }

    /// One row per (statistics name, organisation) within each field, saved as CSV.
    pub fn create_catalog_index(
        &self,
        catalogs: &FieldCatalogs,
    ) -> Result<(Vec<CatalogIndexEntry>, PathBuf)> {
        std::fs::create_dir_all(&self.output_dir)?;
        let entries = classify::catalog_index(catalogs);

        let path = self
            .output_dir
            .join(format!("catalog_index_{}.csv", timestamp()));
        let mut writer = bom_csv_writer(&path)?;
        for entry in &entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        tracing::info!("インデックス保存: {} ({}件)", path.display(), entries.len());

        Ok((entries, path))
    }
}
