use estat_explorer::config::settings::OllamaSettings;
use estat_explorer::domain::model::{Axis, AxisValue, StatsTable, TableMetadata};
use estat_explorer::domain::ports::TableAdvisor;
use estat_explorer::{MetadataCache, OllamaAdvisor, QueryTranslator};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn settings(server: &MockServer) -> OllamaSettings {
    OllamaSettings {
        enabled: true,
        base_url: server.base_url(),
        model: "test-model".to_string(),
        ..Default::default()
    }
}

async fn mock_tags(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200)
                .json_body(json!({"models": [{"name": "test-model:latest"}]}));
        })
        .await;
}

fn cache_with_census(temp_dir: &TempDir) -> MetadataCache {
    let cache = MetadataCache::open(temp_dir.path().join("estat_metadata.db")).unwrap();
    cache
        .save_stats_tables(&[StatsTable {
            table_id: "0003410379".to_string(),
            stat_name: "国勢調査".to_string(),
            title: "男女別人口".to_string(),
            gov_org: "総務省".to_string(),
            main_category_code: "02".to_string(),
            main_category: "人口・世帯".to_string(),
            sub_category_code: "01".to_string(),
            sub_category: "人口".to_string(),
            ..Default::default()
        }])
        .unwrap();
    cache
        .save_table_metadata(&TableMetadata {
            table_id: "0003410379".to_string(),
            axes: vec![Axis {
                id: "cat01".to_string(),
                name: "男女別".to_string(),
                values: ["総数", "男", "女"]
                    .iter()
                    .enumerate()
                    .map(|(i, name)| AxisValue {
                        code: format!("00{}", i + 1),
                        name: name.to_string(),
                        unit: "人".to_string(),
                        ..Default::default()
                    })
                    .collect(),
            }],
        })
        .unwrap();
    cache
}

#[tokio::test]
async fn test_suggestion_is_read_from_model_answer() {
    let server = MockServer::start_async().await;
    mock_tags(&server).await;

    let generate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("\"model\":\"test-model\"")
                .body_contains("\"stream\":false")
                .body_contains("東京都の男女別人口");
            then.status(200).json_body(json!({
                "model": "test-model",
                "response": "提案は次のとおりです。\n{\"stats_table_id\": \"0003410379\", \"table_name\": \"国勢調査 男女別人口\", \"axis_mappings\": {\"cdArea\": \"地域\", \"cdCat01\": \"男女別\"}, \"confidence\": 0.85, \"reasoning\": \"男女別の人口を収録\"}\n",
                "done": true
            }));
        })
        .await;

    let advisor = OllamaAdvisor::connect(&settings(&server), None).await.unwrap();
    assert!(advisor.is_available());

    let suggestion = advisor.suggest("東京都の男女別人口", Some("東京都"), None).await;
    generate.assert_async().await;
    assert_eq!(suggestion.stats_table_id, "0003410379");
    assert_eq!(suggestion.confidence, 0.85);
    assert_eq!(suggestion.axis_mappings["cdCat01"], "男女別");
}

#[tokio::test]
async fn test_model_failure_falls_back_to_rules() {
    let server = MockServer::start_async().await;
    mock_tags(&server).await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500).body("model not loaded");
        })
        .await;

    let advisor = OllamaAdvisor::connect(&settings(&server), None).await.unwrap();
    let suggestion = advisor.suggest("東京都の人口", None, None).await;

    generate.assert_async().await;
    assert_eq!(suggestion.stats_table_id, "00200521001");
    assert_eq!(suggestion.confidence, 0.7);
}

#[tokio::test]
async fn test_failed_health_check_leaves_advisor_offline() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(404);
        })
        .await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({"response": "{}"}));
        })
        .await;

    let advisor = OllamaAdvisor::connect(&settings(&server), None).await.unwrap();
    assert!(!advisor.is_available());

    let suggestion = advisor.suggest("完全失業率の推移", None, None).await;
    assert_eq!(suggestion.stats_table_id, "00450011001");
    assert_eq!(generate.hits_async().await, 0);
}

#[tokio::test]
async fn test_explain_prefers_cached_axes() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    mock_tags(&server).await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({"response": "{}"}));
        })
        .await;

    let cache = cache_with_census(&temp_dir);
    let advisor = OllamaAdvisor::connect(&settings(&server), Some(cache))
        .await
        .unwrap();

    let explanation = advisor.explain_axis_codes("0003410379").await;
    assert_eq!(generate.hits_async().await, 0);
    assert_eq!(explanation.len(), 1);
    assert_eq!(explanation["cat01"].description, "男女別 - 総数");
    assert_eq!(explanation["cat01"].unit, "人");
    assert_eq!(explanation["cat01"].examples["002"], "男");

    let status = advisor.status();
    assert!(status.available);
    assert_eq!(status.model, "test-model");
    assert_eq!(status.cached_tables, 1);
}

#[tokio::test]
async fn test_explain_asks_model_for_unknown_tables() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    mock_tags(&server).await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("0003191203")
                .body_contains("0003410379: 国勢調査 - 男女別人口");
            then.status(200).json_body(json!({
                "response": "```json\n{\"cdCat01\": {\"description\": \"就業状態\", \"examples\": {\"001\": \"労働力人口\"}}}\n```"
            }));
        })
        .await;

    let cache = cache_with_census(&temp_dir);
    let advisor = OllamaAdvisor::connect(&settings(&server), Some(cache))
        .await
        .unwrap();

    let explanation = advisor.explain_axis_codes("0003191203").await;
    generate.assert_async().await;
    assert_eq!(explanation.len(), 1);
    assert_eq!(explanation["cdCat01"].description, "就業状態");
    assert_eq!(explanation["cdCat01"].examples["001"], "労働力人口");
    assert!(explanation["cdCat01"].unit.is_empty());
}

#[tokio::test]
async fn test_translator_uses_advisor_with_rule_alternatives() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    mock_tags(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({
                "response": "{\"stats_table_id\": \"0003410379\", \"table_name\": \"国勢調査\", \"axis_mappings\": {\"cdArea\": \"地域\", \"cdCat02\": \"男女別\"}, \"confidence\": 1.4, \"reasoning\": \"国勢調査が最適\"}"
            }));
        })
        .await;

    let advisor = OllamaAdvisor::connect(&settings(&server), None).await.unwrap();
    let translator = QueryTranslator::open(&temp_dir.path().join("catalog_index.db"), 2024)
        .unwrap()
        .with_advisor(Box::new(advisor));

    let results = translator
        .translate_query("東京都の男女別人口", 5)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let best = &results[0];
    assert_eq!(best.stats_data_id, "0003410379");
    assert_eq!(best.description, "AI提案: 国勢調査");
    assert_eq!(best.confidence_score, 1.0);
    assert_eq!(best.parameters["cdArea"], "13000");
    assert_eq!(best.parameters["cdCat02"], "002,003");
    assert!(!best.alternative_suggestions.is_empty());
    assert!(best.alternative_suggestions.len() <= 4);
    assert!(best
        .alternative_suggestions
        .iter()
        .all(|alt| alt.alternative_suggestions.is_empty()));
}
