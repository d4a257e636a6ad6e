use crate::adapters::sqlite::TableIndex;
use crate::core::knowledge::{self, AREA_MAPPINGS, STATS_KEYWORDS};
use crate::domain::model::{
    AdvisorSuggestion, EntitySet, IndexedTable, QueryCategory, QueryResult, TimePeriod,
};
use crate::domain::ports::TableAdvisor;
use crate::utils::error::{EstatError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

const MAX_SUGGESTIONS: usize = 10;

/// 性別指定時の cdCat02 (男, 女)
const GENDER_CODES: &str = "002,003";
/// 年齢指定時の cdCat01 (0歳〜100歳以上)
const AGE_RANGE_CODES: &str = "01000-01021";
/// 年齢軸の総数
const AGE_TOTAL_CODE: &str = "01000";

/// Translates free-text Japanese queries into e-Stat table IDs and API parameters.
pub struct QueryTranslator {
    index: TableIndex,
    advisor: Option<Box<dyn TableAdvisor>>,
    latest_year: u16,
    year_pattern: Regex,
}

fn time_code(year: impl std::fmt::Display) -> String {
    format!("{}000000", year)
}

impl QueryTranslator {
    pub fn new(index: TableIndex, latest_year: u16) -> Result<Self> {
        let year_pattern = Regex::new(r"([0-9]{4})年?").map_err(|e| EstatError::ConfigError {
            message: e.to_string(),
        })?;
        Ok(Self {
            index,
            advisor: None,
            latest_year,
            year_pattern,
        })
    }

    /// Opens the index at `index_path`, seeding a new one with the sample tables.
    pub fn open(index_path: &Path, latest_year: u16) -> Result<Self> {
        let index = TableIndex::open(index_path, &knowledge::sample_tables())?;
        Self::new(index, latest_year)
    }

    pub fn with_advisor(mut self, advisor: Box<dyn TableAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    pub fn parse_query(&self, query: &str) -> EntitySet {
        let query = query.trim();

        let regions = AREA_MAPPINGS
            .iter()
            .filter(|(name, _)| query.contains(name))
            .map(|(name, _)| name.to_string())
            .collect();

        let statistical_items = STATS_KEYWORDS
            .iter()
            .filter(|(item, keywords)| query.contains(item) || keywords.iter().any(|k| query.contains(k)))
            .map(|(item, _)| item.to_string())
            .collect();

        let mut time_periods: Vec<TimePeriod> = self
            .year_pattern
            .captures_iter(query)
            .map(|caps| TimePeriod::Year(caps[1].to_string()))
            .collect();
        if query.contains("最新") || query.contains("最近") {
            time_periods.push(TimePeriod::Latest);
        }

        let mut categories = Vec::new();
        if query.contains("年齢") || query.contains("年代") {
            categories.push(QueryCategory::Age);
        }
        if query.contains("男女") || query.contains("性別") {
            categories.push(QueryCategory::Gender);
        }
        if query.contains("産業") || query.contains("業種") {
            categories.push(QueryCategory::Industry);
        }

        EntitySet {
            regions,
            time_periods,
            categories,
            statistical_items,
        }
    }

    pub fn search_stats_tables(&self, entities: &EntitySet) -> Result<Vec<IndexedTable>> {
        self.index.search(&entities.statistical_items)
    }

    fn time_parameter(&self, entities: &EntitySet) -> Option<String> {
        if entities.wants_latest() {
            Some(time_code(self.latest_year))
        } else {
            entities.first_year().map(time_code)
        }
    }

    pub fn generate_parameters(
        &self,
        entities: &EntitySet,
        table: &IndexedTable,
    ) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();

        if let Some(code) = entities.regions.first().and_then(|r| knowledge::area_code(r)) {
            parameters.insert("cdArea".to_string(), code.to_string());
        }

        if entities.has_category(QueryCategory::Gender) && table.categories.contains_key("cdCat02") {
            parameters.insert("cdCat02".to_string(), GENDER_CODES.to_string());
        }

        if entities.has_category(QueryCategory::Age) && table.categories.contains_key("cdCat01") {
            parameters.insert("cdCat01".to_string(), AGE_RANGE_CODES.to_string());
        }

        if let Some(code) = self.time_parameter(entities) {
            parameters.insert("cdTime".to_string(), code);
        }

        parameters
    }

    pub fn calculate_confidence(entities: &EntitySet, table: &IndexedTable) -> f64 {
        let mut score = 0.0;

        if !entities.statistical_items.is_empty() {
            let matched = entities
                .statistical_items
                .iter()
                .filter(|item| table.keywords.contains(item))
                .count();
            score += (matched as f64 / entities.statistical_items.len() as f64) * 0.6;
        }

        if entities.regions.is_empty() {
            // 地域指定なし
            score += 0.2;
        } else if entities
            .regions
            .iter()
            .any(|region| table.available_areas.contains(region))
        {
            score += 0.3;
        }

        if !entities.categories.is_empty() && !table.categories.is_empty() {
            score += 0.1;
        }

        f64::min(score, 1.0)
    }

    /// Returns at most one result; the runners-up are attached as its alternatives.
    pub async fn translate_query(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
        match &self.advisor {
            Some(advisor) if advisor.is_available() => {
                self.translate_with_advisor(advisor.as_ref(), query, limit).await
            }
            _ => self.translate_with_rules(query, limit),
        }
    }

    pub fn translate_with_rules(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
        let entities = self.parse_query(query);
        let candidates = self.search_stats_tables(&entities)?;
        tracing::debug!(
            "Query '{}' → {:?}, {} candidate tables",
            query,
            entities,
            candidates.len()
        );

        let mut results: Vec<QueryResult> = candidates
            .iter()
            .take(limit)
            .map(|table| QueryResult {
                stats_data_id: table.stats_data_id.clone(),
                parameters: self.generate_parameters(&entities, table),
                description: table.description.clone(),
                confidence_score: Self::calculate_confidence(&entities, table),
                table_name: table.table_name.clone(),
                alternative_suggestions: Vec::new(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(Ordering::Equal)
        });

        let mut ranked = results.into_iter();
        Ok(match ranked.next() {
            Some(mut best) => {
                best.alternative_suggestions = ranked.collect();
                vec![best]
            }
            None => Vec::new(),
        })
    }

    async fn translate_with_advisor(
        &self,
        advisor: &dyn TableAdvisor,
        query: &str,
        limit: usize,
    ) -> Result<Vec<QueryResult>> {
        tracing::info!("🤖 Asking the LLM advisor for a table and axes");
        let entities = self.parse_query(query);

        let region = entities.regions.first().map(String::as_str);
        let period = entities.time_periods.first().map(|p| p.to_string());
        let suggestion = advisor.suggest(query, region, period.as_deref()).await;

        let parameters = self.generate_ai_parameters(&entities, &suggestion);
        tracing::info!(
            "🎯 Advisor picked {} (confidence {:.2}): {}",
            suggestion.table_name,
            suggestion.confidence,
            suggestion.reasoning
        );

        let mut alternatives = Vec::new();
        for mut result in self.translate_with_rules(query, limit.saturating_sub(1))? {
            let nested = std::mem::take(&mut result.alternative_suggestions);
            alternatives.push(result);
            alternatives.extend(nested);
        }
        alternatives.truncate(limit.saturating_sub(1));

        Ok(vec![QueryResult {
            stats_data_id: suggestion.stats_table_id.clone(),
            parameters,
            description: format!("AI提案: {}", suggestion.table_name),
            confidence_score: suggestion.confidence.clamp(0.0, 1.0),
            table_name: suggestion.table_name,
            alternative_suggestions: alternatives,
        }])
    }

    pub fn generate_ai_parameters(
        &self,
        entities: &EntitySet,
        suggestion: &AdvisorSuggestion,
    ) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();
        let axes = &suggestion.axis_mappings;

        if axes.contains_key("cdArea") {
            if let Some(code) = entities.regions.first().and_then(|r| knowledge::area_code(r)) {
                parameters.insert("cdArea".to_string(), code.to_string());
            }
        }

        if axes.contains_key("cdTime") {
            if let Some(code) = self.time_parameter(entities) {
                parameters.insert("cdTime".to_string(), code);
            }
        }

        for (axis_code, description) in axes.iter().filter(|(code, _)| code.starts_with("cdCat")) {
            if entities.has_category(QueryCategory::Gender) && description.contains("男女") {
                parameters.insert(axis_code.clone(), GENDER_CODES.to_string());
            } else if entities.has_category(QueryCategory::Age) && description.contains("年齢") {
                parameters.insert(axis_code.clone(), AGE_TOTAL_CODE.to_string());
            }
        }

        parameters
    }

    pub fn get_query_suggestions(&self, partial_query: &str) -> Vec<String> {
        let area_suggestions = AREA_MAPPINGS
            .iter()
            .filter(|(area, _)| area.starts_with(partial_query))
            .flat_map(|(area, _)| [format!("{}の人口データ", area), format!("{}の雇用統計", area)]);

        let item_suggestions = STATS_KEYWORDS
            .iter()
            .filter(|(item, _)| item.starts_with(partial_query))
            .flat_map(|(item, _)| [format!("{}の推移", item), format!("都道府県別{}", item)]);

        area_suggestions
            .chain(item_suggestions)
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}
