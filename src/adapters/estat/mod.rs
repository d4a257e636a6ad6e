pub mod json;

use crate::config::settings::EstatSettings;
use crate::domain::model::{StatsFrame, StatsTable, TableMetadata};
use crate::utils::error::Result;
use crate::utils::validation::validate_url;
use json::{StatsDataPage, StatsListPage};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Query parameters the client always sets itself.
pub const RESERVED_PARAMS: &[&str] = &["appId", "lang", "statsDataId", "limit", "startPosition"];

/// Filters for `getStatsList`.
#[derive(Debug, Clone, Default)]
pub struct StatsListQuery {
    /// 政府統計コード (e.g. 00200521 for 国勢調査)
    pub stats_code: Option<String>,
    pub search_word: Option<String>,
    /// 統計分野 (2 or 4 digits)
    pub stats_field: Option<String>,
    pub limit: Option<usize>,
    pub start_position: Option<u64>,
}

impl StatsListQuery {
    pub fn for_stats_code(code: &str) -> Self {
        Self {
            stats_code: Some(code.to_string()),
            ..Default::default()
        }
    }

    fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(code) = &self.stats_code {
            params.push(("statsCode".to_string(), code.clone()));
        }
        if let Some(word) = &self.search_word {
            params.push(("searchWord".to_string(), word.clone()));
        }
        if let Some(field) = &self.stats_field {
            params.push(("statsField".to_string(), field.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(start) = self.start_position {
            params.push(("startPosition".to_string(), start.to_string()));
        }
        params
    }
}

/// Client for the e-Stat API v3 JSON endpoints.
#[derive(Debug, Clone)]
pub struct EstatClient {
    client: Client,
    base_url: String,
    app_id: String,
    lang: String,
    page_size: usize,
}

impl EstatClient {
    pub fn new(app_id: &str, settings: &EstatSettings) -> Result<Self> {
        validate_url("estat.base_url", &settings.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            lang: settings.lang.clone(),
            page_size: settings.page_size.max(1),
        })
    }

    async fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value> {
        let url = format!("{}/json/{}", self.base_url, endpoint);
        tracing::debug!("Making API request to: {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(&[("appId", self.app_id.as_str()), ("lang", self.lang.as_str())])
            .query(params)
            .send()
            .await?;

        tracing::debug!("API response status: {}", response.status());
        let body = response.error_for_status()?.json::<Value>().await?;
        Ok(body)
    }

    pub async fn get_stats_list(&self, query: &StatsListQuery) -> Result<StatsListPage> {
        let root = self.get_json("getStatsList", &query.to_params()).await?;
        json::parse_stats_list(&root)
    }

    /// Follows `NEXT_KEY` until the list is exhausted or `max_tables` are collected.
    pub async fn get_all_stats_list(
        &self,
        query: &StatsListQuery,
        max_tables: usize,
    ) -> Result<Vec<StatsTable>> {
        let mut tables: Vec<StatsTable> = Vec::new();
        let mut page_query = query.clone();
        page_query.start_position.get_or_insert(1);

        while tables.len() < max_tables {
            page_query.limit = Some(self.page_size.min(max_tables - tables.len()));
            let page = self.get_stats_list(&page_query).await?;
            tracing::debug!(
                "getStatsList page: {} tables (total {})",
                page.tables.len(),
                page.total
            );
            let fetched = page.tables.len();
            tables.extend(page.tables);

            match page.next_key {
                Some(next) if fetched > 0 && Some(next) > page_query.start_position => {
                    page_query.start_position = Some(next)
                }
                _ => break,
            }
        }

        tables.truncate(max_tables);
        Ok(tables)
    }

    pub async fn get_meta_info(&self, table_id: &str) -> Result<TableMetadata> {
        let params = vec![("statsDataId".to_string(), table_id.to_string())];
        let root = self.get_json("getMetaInfo", &params).await?;
        json::parse_meta_info(&root, table_id)
    }

    pub async fn get_stats_data(
        &self,
        stats_data_id: &str,
        parameters: &BTreeMap<String, String>,
        start_position: Option<u64>,
        limit: usize,
    ) -> Result<StatsDataPage> {
        let mut params = vec![
            ("statsDataId".to_string(), stats_data_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        for (key, value) in parameters {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                tracing::warn!("⚠️ Ignoring reserved parameter {}={}", key, value);
                continue;
            }
            params.push((key.clone(), value.clone()));
        }
        if let Some(start) = start_position {
            params.push(("startPosition".to_string(), start.to_string()));
        }

        let root = self.get_json("getStatsData", &params).await?;
        json::parse_stats_data(&root, stats_data_id)
    }

    /// Fetches every page of a table, up to `max_records` values.
    pub async fn get_all_stats_data(
        &self,
        stats_data_id: &str,
        parameters: &BTreeMap<String, String>,
        max_records: usize,
    ) -> Result<StatsFrame> {
        let first = self
            .get_stats_data(stats_data_id, parameters, Some(1), self.page_size.min(max_records))
            .await?;
        let mut frame = first.frame;
        let mut next_key = first.next_key;
        let mut last_start = 1u64;

        while let Some(start) = next_key {
            if frame.observations.len() >= max_records || start <= last_start {
                break;
            }
            let remaining = max_records - frame.observations.len();
            tracing::debug!("Fetching {} from position {}", stats_data_id, start);
            let page = self
                .get_stats_data(
                    stats_data_id,
                    parameters,
                    Some(start),
                    self.page_size.min(remaining),
                )
                .await?;
            frame.observations.extend(page.frame.observations);
            last_start = start;
            next_key = page.next_key;
        }

        if frame.observations.len() > max_records {
            frame.observations.truncate(max_records);
        }
        if next_key.is_some() && frame.observations.len() >= max_records {
            tracing::warn!(
                "⚠️ {} has {} values; stopped at {}",
                stats_data_id,
                frame.total_number,
                max_records
            );
        }

        Ok(frame)
    }
}
