//! Walk-through of one statistics code: its catalog, then the data of its first table.

use crate::adapters::estat::{EstatClient, StatsListQuery};
use crate::core::pipeline::{StatsDataPipeline, StatsDataRequest};
use crate::domain::model::{StatsTable, TimeSeries};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::Result;
use std::collections::BTreeMap;

const SAMPLE_TABLES: usize = 10;
const SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub stats_data_id: String,
    pub columns: Vec<String>,
    pub head: Vec<Vec<String>>,
    pub series: Option<TimeSeries>,
    pub output_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExploreReport {
    pub stats_code: String,
    pub table_count: usize,
    pub categories: Vec<(String, String)>,
    pub subcategories: Vec<(String, String)>,
    pub sample_tables: Vec<StatsTable>,
    pub data: Option<TableData>,
    pub fetch_error: Option<String>,
}

fn unique_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<(String, String)> {
    let mut unique: Vec<(String, String)> = Vec::new();
    for (code, name) in pairs {
        if !unique.iter().any(|(c, n)| c == code && n == name) {
            unique.push((code.to_string(), name.to_string()));
        }
    }
    unique
}

/// Lists the tables of `stats_code`, then fetches and archives the first one.
/// A failed fetch is recorded in the report rather than returned.
pub async fn explore<S: Storage>(
    client: &EstatClient,
    storage: S,
    stats_code: &str,
    max_records: usize,
) -> Result<ExploreReport> {
    tracing::info!("🔍 Searching tables for statistics code {}", stats_code);
    let tables = client
        .get_all_stats_list(&StatsListQuery::for_stats_code(stats_code), usize::MAX)
        .await?;

    let mut report = ExploreReport {
        stats_code: stats_code.to_string(),
        table_count: tables.len(),
        categories: unique_pairs(
            tables
                .iter()
                .map(|t| (t.main_category_code.as_str(), t.main_category.as_str())),
        ),
        subcategories: unique_pairs(
            tables
                .iter()
                .map(|t| (t.sub_category_code.as_str(), t.sub_category.as_str())),
        ),
        sample_tables: tables.iter().take(SAMPLE_TABLES).cloned().collect(),
        ..Default::default()
    };

    let Some(first) = tables.first() else {
        tracing::warn!("⚠️ No tables for statistics code {}", stats_code);
        return Ok(report);
    };

    tracing::info!("📊 Fetching data for table {}", first.table_id);
    let pipeline = StatsDataPipeline::new(
        client.clone(),
        StatsDataRequest {
            stats_data_id: first.table_id.clone(),
            parameters: BTreeMap::new(),
            max_records,
        },
        storage,
    );

    match fetch_table(&pipeline, &first.table_id).await {
        Ok(data) => report.data = Some(data),
        Err(e) => {
            tracing::error!("❌ Fetching {} failed: {}", first.table_id, e);
            report.fetch_error = Some(e.user_friendly_message());
        }
    }

    Ok(report)
}

async fn fetch_table<P: Pipeline>(pipeline: &P, stats_data_id: &str) -> Result<TableData> {
    let frame = pipeline.extract().await?;
    let result = pipeline.transform(frame).await?;

    let columns = result.frame.columns();
    let head = result
        .frame
        .observations
        .iter()
        .take(SAMPLE_ROWS)
        .map(|o| result.frame.row(o))
        .collect();
    let series = result.series.clone();
    let output_path = pipeline.load(result).await?;

    Ok(TableData {
        stats_data_id: stats_data_id.to_string(),
        columns,
        head,
        series,
        output_path,
    })
}

impl ExploreReport {
    pub fn print(&self) {
        println!("\n===== 統計データのカテゴリ一覧 =====");
        for (code, name) in &self.categories {
            println!("  {}  {}", code, name);
        }

        println!("\n===== サブカテゴリ一覧 =====");
        for (code, name) in &self.subcategories {
            println!("  {}  {}", code, name);
        }

        println!(
            "\n===== 統計表の例（最初の{}件 / 全{}件） =====",
            self.sample_tables.len(),
            self.table_count
        );
        for table in &self.sample_tables {
            println!("  {}  {}  {}", table.table_id, table.title, table.survey_date);
        }

        if let Some(error) = &self.fetch_error {
            println!("\nエラーが発生しました: {}", error);
            println!("別の統計表IDを試してみてください。");
        }

        let Some(data) = &self.data else {
            return;
        };

        println!("\n===== 取得したデータのサンプル ({}) =====", data.stats_data_id);
        println!("{}", data.columns.join("\t"));
        for row in &data.head {
            println!("{}", row.join("\t"));
        }

        println!("\n===== データカラム（カテゴリ情報） =====");
        for column in &data.columns {
            println!("- {}", column);
        }

        match &data.series {
            Some(series) => {
                println!("\n===== {}の推移 =====", series.name);
                for point in &series.points {
                    match point.value {
                        Some(value) => println!("  {}  {}", point.time_label, value),
                        None => println!("  {}  -", point.time_label),
                    }
                }
            }
            None => println!("\n時間軸のカラムが見つからないため、推移の抽出はスキップします"),
        }

        println!("\n💾 {}", data.output_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_pairs_keeps_first_seen_order() {
        let pairs = vec![("02", "労働"), ("01", "人口"), ("02", "労働")];
        assert_eq!(
            unique_pairs(pairs.into_iter()),
            vec![
                ("02".to_string(), "労働".to_string()),
                ("01".to_string(), "人口".to_string())
            ]
        );
    }
}
