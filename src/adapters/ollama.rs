use crate::adapters::sqlite::MetadataCache;
use crate::config::settings::OllamaSettings;
use crate::domain::model::AdvisorSuggestion;
use crate::domain::ports::TableAdvisor;
use crate::utils::error::{EstatError, Result};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const TABLES_PER_SUBCATEGORY: usize = 3;
const AXIS_EXAMPLES: usize = 5;

const CENSUS_TABLE_ID: &str = "00200521001";
const CENSUS_TABLE_NAME: &str = "国勢調査（人口等基本集計）";
const LABOUR_TABLE_ID: &str = "00450011001";
const LABOUR_TABLE_NAME: &str = "労働力調査（基本集計）";

const SAMPLE_STATS_CONTEXT: &str = "\
利用可能な主要統計表（サンプル）:
【人口・世帯】
  00200521001: 国勢調査（人口等基本集計）
  0000020101: 人口推計（月報）
【労働・雇用】
  00450011001: 労働力調査（基本集計）
【家計・消費】
  00200553001: 家計調査（家計収支編）
";

const AXIS_KNOWLEDGE: &[(&str, &[(&str, &str)])] = &[
    (
        "地域軸",
        &[
            ("cdArea", "地域コード"),
            ("全国", "00000"),
            ("都道府県", "01000-47000"),
            ("市区町村", "詳細コード"),
        ],
    ),
    (
        "時間軸",
        &[
            ("cdTime", "時間コード"),
            ("年次", "YYYY000000"),
            ("月次", "YYYYMM0000"),
            ("四半期", "YYYYQQ0000"),
        ],
    ),
    (
        "分類軸",
        &[
            ("cdCat01", "第1分類（年齢、性別等）"),
            ("cdCat02", "第2分類（職業、産業等）"),
            ("cdCat03", "第3分類（詳細分類）"),
        ],
    ),
];

/// What one axis code means for a given table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisExplanation {
    pub description: String,
    pub unit: String,
    pub examples: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaStatus {
    pub available: bool,
    pub base_url: String,
    pub model: String,
    pub cached_tables: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Table advisor backed by a local Ollama server.
pub struct OllamaAdvisor {
    client: Client,
    base_url: String,
    model: String,
    available: bool,
    cache: Option<MetadataCache>,
    json_pattern: Regex,
}

fn suggestion(
    table_id: &str,
    table_name: &str,
    axes: &[(&str, &str)],
    confidence: f64,
    reasoning: &str,
) -> AdvisorSuggestion {
    AdvisorSuggestion {
        stats_table_id: table_id.to_string(),
        table_name: table_name.to_string(),
        axis_mappings: axes
            .iter()
            .map(|(code, desc)| (code.to_string(), desc.to_string()))
            .collect(),
        confidence,
        reasoning: reasoning.to_string(),
    }
}

/// Used when the model answered but no suggestion could be read from it.
pub fn unparsable_response_suggestion() -> AdvisorSuggestion {
    suggestion(
        CENSUS_TABLE_ID,
        CENSUS_TABLE_NAME,
        &[("cdArea", "地域コード")],
        0.3,
        "AI解析に失敗したためデフォルト統計表を選択",
    )
}

/// Keyword rules used when the model cannot be reached.
pub fn rule_based_suggestion(query: &str) -> AdvisorSuggestion {
    if query.contains("人口") {
        suggestion(
            CENSUS_TABLE_ID,
            CENSUS_TABLE_NAME,
            &[
                ("cdCat01", "年齢階級"),
                ("cdCat02", "男女別"),
                ("cdArea", "地域コード"),
            ],
            0.7,
            "人口関連クエリのため国勢調査を選択",
        )
    } else if query.contains("労働") || query.contains("失業") {
        suggestion(
            LABOUR_TABLE_ID,
            LABOUR_TABLE_NAME,
            &[("cdCat01", "労働力状態"), ("cdCat02", "男女別")],
            0.6,
            "労働関連クエリのため労働力調査を選択",
        )
    } else {
        suggestion(
            CENSUS_TABLE_ID,
            CENSUS_TABLE_NAME,
            &[("cdArea", "地域コード")],
            0.4,
            "一般的なクエリのためデフォルト統計表を選択",
        )
    }
}

fn default_axis_explanations() -> BTreeMap<String, AxisExplanation> {
    let entry = |description: &str, examples: &[(&str, &str)]| AxisExplanation {
        description: description.to_string(),
        unit: String::new(),
        examples: examples
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect(),
    };

    BTreeMap::from([
        (
            "cdArea".to_string(),
            entry(
                "地域コード（都道府県・市区町村）",
                &[("00000", "全国"), ("13000", "東京都"), ("27000", "大阪府")],
            ),
        ),
        (
            "cdTime".to_string(),
            entry(
                "時間コード（年月日）",
                &[("2020000000", "2020年"), ("2024000000", "2024年")],
            ),
        ),
        (
            "cdCat01".to_string(),
            entry(
                "第1分類（年齢・性別等）",
                &[("001", "総数"), ("002", "男性"), ("003", "女性")],
            ),
        ),
    ])
}

impl OllamaAdvisor {
    /// Checks `/api/tags`; an unreachable server leaves the advisor unavailable.
    pub async fn connect(settings: &OllamaSettings, cache: Option<MetadataCache>) -> Result<Self> {
        validate_url("ollama.base_url", &settings.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        let json_pattern = Regex::new(r"(?s)\{.*\}").map_err(|e| EstatError::ConfigError {
            message: e.to_string(),
        })?;

        let mut advisor = Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            available: false,
            cache,
            json_pattern,
        };

        if settings.enabled {
            advisor.available = advisor.check_health().await;
        }
        if advisor.available {
            tracing::info!("🤖 Ollama available at {} ({})", advisor.base_url, advisor.model);
        } else {
            tracing::info!("Ollama not available; using rule-based suggestions");
        }

        Ok(advisor)
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }

    /// The model's raw answer, or `None` when it could not be obtained.
    async fn generate(&self, prompt: &str) -> Option<String> {
        if !self.available {
            return None;
        }

        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("⚠️ Ollama request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("⚠️ Ollama returned {}", response.status());
            return None;
        }

        match response.json::<GenerateResponse>().await {
            Ok(body) => Some(body.response),
            Err(e) => {
                tracing::warn!("⚠️ Unreadable Ollama response: {}", e);
                None
            }
        }
    }

    fn stats_context(&self) -> String {
        let context = match self.cache.as_ref().map(|c| c.load_llm_context()) {
            Some(Ok(context)) if context.total > 0 => context,
            Some(Err(e)) => {
                tracing::warn!("⚠️ Could not read metadata cache: {}", e);
                return SAMPLE_STATS_CONTEXT.to_string();
            }
            _ => return SAMPLE_STATS_CONTEXT.to_string(),
        };

        let mut out = format!(
            "e-stat政府統計データベース（統計表総数: {}件）\n最終更新: {}\n\n=== 利用可能な統計表一覧 ===\n",
            context.total, context.updated
        );
        for category in &context.categories {
            let _ = writeln!(out, "\n【{}】", category.name);
            for sub in &category.subcategories {
                let _ = writeln!(out, "  ▶ {}", sub.name);
                for table in sub.tables.iter().take(TABLES_PER_SUBCATEGORY) {
                    let _ = writeln!(
                        out,
                        "    {}: {} - {} ({})",
                        table.table_id, table.stat_name, table.title, table.gov_org
                    );
                    if !table.axes.is_empty() {
                        let ids: Vec<&str> = table.axes.iter().map(|a| a.id.as_str()).collect();
                        let _ = writeln!(out, "      軸: {}", ids.join(", "));
                    }
                }
                if sub.tables.len() > TABLES_PER_SUBCATEGORY {
                    let _ = writeln!(
                        out,
                        "    ... 他{}件",
                        sub.tables.len() - TABLES_PER_SUBCATEGORY
                    );
                }
            }
        }
        out
    }

    fn axis_context() -> String {
        let mut out = String::from("軸コード情報:\n");
        for (axis_type, entries) in AXIS_KNOWLEDGE {
            let _ = writeln!(out, "\n【{}】", axis_type);
            for (code, description) in entries.iter() {
                let _ = writeln!(out, "  {}: {}", code, description);
            }
        }
        out
    }

    pub fn build_suggestion_prompt(
        &self,
        query: &str,
        region: Option<&str>,
        time_period: Option<&str>,
    ) -> String {
        format!(
            r#"あなたは日本の政府統計データ（e-stat）の専門家です。
以下のクエリに最適な統計表IDと軸パラメータを提案してください。

【クエリ】
{query}

【追加情報】
地域: {region}
時期: {period}

{stats}

{axes}

【回答形式】
以下のJSON形式で回答してください:
{{
    "stats_table_id": "統計表ID",
    "table_name": "統計表名",
    "axis_mappings": {{
        "cdArea": "地域軸の説明",
        "cdTime": "時間軸の説明",
        "cdCat01": "第1分類軸の説明",
        "cdCat02": "第2分類軸の説明"
    }},
    "confidence": 0.0-1.0の信頼度,
    "reasoning": "選択理由の説明"
}}

注意事項:
- 統計表IDは必ず上記リストから選択
- 軸マッピングは実際に必要なもののみ含める
- 信頼度は選択の確実性を0-1で評価
- 理由は簡潔に日本語で説明
"#,
            query = query,
            region = region.unwrap_or("指定なし"),
            period = time_period.unwrap_or("指定なし"),
            stats = self.stats_context(),
            axes = Self::axis_context(),
        )
    }

    pub fn parse_suggestion(&self, answer: &str) -> AdvisorSuggestion {
        let Some(found) = self.json_pattern.find(answer) else {
            tracing::warn!("⚠️ No JSON object in Ollama answer");
            return unparsable_response_suggestion();
        };

        match serde_json::from_str::<AdvisorSuggestion>(found.as_str()) {
            Ok(suggestion) => suggestion,
            Err(e) => {
                tracing::warn!("⚠️ Could not parse Ollama suggestion: {}", e);
                unparsable_response_suggestion()
            }
        }
    }

    /// Cached axis details when present, otherwise the model's answer, otherwise a fixed table.
    pub async fn explain_axis_codes(&self, table_id: &str) -> BTreeMap<String, AxisExplanation> {
        if let Some(cache) = &self.cache {
            match cache.get_table_axis_details(table_id) {
                Ok(details) if !details.is_empty() => {
                    return details
                        .into_iter()
                        .map(|axis| {
                            let explanation = AxisExplanation {
                                description: format!("{} - {}", axis.axis_name, axis.class_name),
                                unit: axis.unit,
                                examples: axis
                                    .values
                                    .into_iter()
                                    .take(AXIS_EXAMPLES)
                                    .map(|v| (v.code, v.name))
                                    .collect(),
                            };
                            (axis.axis_id, explanation)
                        })
                        .collect();
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ Could not read axis details for {}: {}", table_id, e),
            }
        }

        let prompt = format!(
            r#"統計表ID「{table_id}」で利用可能な軸コードとその具体的な値について説明してください。

{stats}

例えば:
- cdCat01で「001」は何を意味するか
- cdAreaで「13000」は何を意味するか
- cdTimeで「2020000000」は何を意味するか

JSON形式で回答:
{{
    "cdArea": {{"description": "地域軸の説明", "examples": {{"00000": "全国", "13000": "東京都"}}}},
    "cdTime": {{"description": "時間軸の説明", "examples": {{"2020000000": "2020年"}}}},
    "cdCat01": {{"description": "第1分類軸の説明", "examples": {{"001": "総数", "002": "男性"}}}}
}}
"#,
            table_id = table_id,
            stats = self.stats_context(),
        );

        self.generate(&prompt)
            .await
            .and_then(|answer| {
                let found = self.json_pattern.find(&answer)?;
                serde_json::from_str(found.as_str()).ok()
            })
            .unwrap_or_else(default_axis_explanations)
    }

    pub fn status(&self) -> OllamaStatus {
        let cached_tables = match &self.cache {
            Some(cache) => cache.table_count().unwrap_or_else(|e| {
                tracing::warn!("⚠️ Could not count cached tables: {}", e);
                0
            }),
            None => 0,
        };

        OllamaStatus {
            available: self.available,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            cached_tables,
        }
    }
}

#[async_trait]
impl TableAdvisor for OllamaAdvisor {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn suggest(
        &self,
        query: &str,
        region: Option<&str>,
        time_period: Option<&str>,
    ) -> AdvisorSuggestion {
        let prompt = self.build_suggestion_prompt(query, region, time_period);
        match self.generate(&prompt).await {
            Some(answer) => self.parse_suggestion(&answer),
            None => rule_based_suggestion(query),
        }
    }
}
