use estat_explorer::app::explore;
use estat_explorer::config::settings::EstatSettings;
use estat_explorer::{EstatClient, EtlEngine, LocalStorage, StatsDataPipeline, StatsDataRequest};
use httpmock::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Read;
use tempfile::TempDir;

fn population_response() -> serde_json::Value {
    json!({
        "GET_STATS_DATA": {
            "RESULT": {"STATUS": 0, "ERROR_MSG": "正常に終了しました。"},
            "STATISTICAL_DATA": {
                "RESULT_INF": {"TOTAL_NUMBER": 4},
                "TABLE_INF": {"@id": "0003410379", "TITLE": "男女別人口"},
                "CLASS_INF": {
                    "CLASS_OBJ": [
                        {"@id": "cat01", "@name": "男女別", "CLASS": [
                            {"@code": "002", "@name": "男"},
                            {"@code": "003", "@name": "女"}
                        ]},
                        {"@id": "time", "@name": "時間軸（年次）", "CLASS": [
                            {"@code": "2015000000", "@name": "2015年"},
                            {"@code": "2020000000", "@name": "2020年"}
                        ]}
                    ]
                },
                "DATA_INF": {
                    "VALUE": [
                        {"@cat01": "002", "@time": "2020000000", "@unit": "千人", "$": "61350"},
                        {"@cat01": "003", "@time": "2020000000", "@unit": "千人", "$": "64796"},
                        {"@cat01": "002", "@time": "2015000000", "@unit": "千人", "$": "61842"},
                        {"@cat01": "003", "@time": "2015000000", "@unit": "千人", "$": "-"}
                    ]
                }
            }
        }
    })
}

fn client(server: &MockServer) -> EstatClient {
    let settings = EstatSettings {
        base_url: server.base_url(),
        ..Default::default()
    };
    EstatClient::new("test-app", &settings).unwrap()
}

fn read_entry(archive: &mut zip::ZipArchive<std::fs::File>, name: &str) -> String {
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_fetch_writes_archive() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/json/getStatsData")
                .query_param("statsDataId", "0003410379")
                .query_param("cdCat01", "002,003");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(population_response());
        })
        .await;

    let pipeline = StatsDataPipeline::new(
        client(&server),
        StatsDataRequest {
            stats_data_id: "0003410379".to_string(),
            parameters: BTreeMap::from([("cdCat01".to_string(), "002,003".to_string())]),
            max_records: 1000,
        },
        LocalStorage::new(temp_dir.path()),
    );

    let output = EtlEngine::new(pipeline).run().await.unwrap();
    api_mock.assert_async().await;
    assert!(output.ends_with("0003410379.zip"));

    let archive_path = temp_dir.path().join("0003410379.zip");
    assert!(archive_path.exists());

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["data.csv", "data.tsv", "series.csv", "series.json"]);

    let csv = read_entry(&mut archive, "data.csv");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("cat01_code,男女別,time_code,時間軸（年次）,unit,value")
    );
    assert_eq!(lines.next(), Some("002,男,2020000000,2020年,千人,61350"));
    assert!(csv.contains("003,女,2015000000,2015年,千人,-"));

    let tsv = read_entry(&mut archive, "data.tsv");
    assert!(tsv.contains("002\t男\t2020000000\t2020年\t千人\t61350"));

    let series = read_entry(&mut archive, "series.csv");
    assert_eq!(
        series.lines().collect::<Vec<_>>(),
        vec![
            "time_code,time_label,value",
            "2015000000,2015年,61842.0",
            "2020000000,2020年,61350.0"
        ]
    );

    let series_json: serde_json::Value =
        serde_json::from_str(&read_entry(&mut archive, "series.json")).unwrap();
    assert_eq!(series_json["name"], "男");
    assert_eq!(series_json["unit"], "千人");
    assert_eq!(series_json["points"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_api_error_stops_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsData");
            then.status(200).json_body(json!({
                "GET_STATS_DATA": {
                    "RESULT": {"STATUS": 100, "ERROR_MSG": "認証に失敗しました。"}
                }
            }));
        })
        .await;

    let pipeline = StatsDataPipeline::new(
        client(&server),
        StatsDataRequest {
            stats_data_id: "0003410379".to_string(),
            parameters: BTreeMap::new(),
            max_records: 1000,
        },
        LocalStorage::new(temp_dir.path()),
    );

    let err = EtlEngine::new(pipeline).run().await.unwrap_err();
    assert_eq!(err.severity(), estat_explorer::utils::error::ErrorSeverity::High);
    assert!(!temp_dir.path().join("0003410379.zip").exists());
}

#[tokio::test]
async fn test_explore_lists_tables_and_fetches_the_first() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let list_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/json/getStatsList")
                .query_param("statsCode", "00200521");
            then.status(200).json_body(json!({
                "GET_STATS_LIST": {
                    "RESULT": {"STATUS": 0},
                    "DATALIST_INF": {
                        "NUMBER": 2,
                        "RESULT_INF": {"FROM_NUMBER": 1, "TO_NUMBER": 2},
                        "TABLE_INF": [
                            {
                                "@id": "0003410379",
                                "STAT_NAME": {"@code": "00200521", "$": "国勢調査"},
                                "TITLE": "男女別人口",
                                "SURVEY_DATE": "202010",
                                "MAIN_CATEGORY": {"@code": "02", "$": "人口・世帯"},
                                "SUB_CATEGORY": {"@code": "01", "$": "人口"}
                            },
                            {
                                "@id": "0003410380",
                                "STAT_NAME": {"@code": "00200521", "$": "国勢調査"},
                                "TITLE": "世帯数",
                                "SURVEY_DATE": "202010",
                                "MAIN_CATEGORY": {"@code": "02", "$": "人口・世帯"},
                                "SUB_CATEGORY": {"@code": "02", "$": "世帯"}
                            }
                        ]
                    }
                }
            }));
        })
        .await;
    let data_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/json/getStatsData")
                .query_param("statsDataId", "0003410379");
            then.status(200).json_body(population_response());
        })
        .await;

    let report = explore(
        &client(&server),
        LocalStorage::new(temp_dir.path()),
        "00200521",
        1000,
    )
    .await
    .unwrap();

    list_mock.assert_async().await;
    data_mock.assert_async().await;
    assert_eq!(report.table_count, 2);
    assert_eq!(
        report.categories,
        vec![("02".to_string(), "人口・世帯".to_string())]
    );
    assert_eq!(report.subcategories.len(), 2);
    assert!(report.fetch_error.is_none());

    let data = report.data.unwrap();
    assert_eq!(data.head.len(), 4);
    assert_eq!(data.series.unwrap().points.len(), 2);
    assert!(temp_dir.path().join("0003410379.zip").exists());
}

#[tokio::test]
async fn test_explore_keeps_listing_when_fetch_fails() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsList");
            then.status(200).json_body(json!({
                "GET_STATS_LIST": {
                    "RESULT": {"STATUS": 0},
                    "DATALIST_INF": {
                        "NUMBER": 1,
                        "TABLE_INF": {
                            "@id": "0003410379",
                            "STAT_NAME": {"@code": "00200521", "$": "国勢調査"},
                            "TITLE": "男女別人口"
                        }
                    }
                }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsData");
            then.status(500);
        })
        .await;

    let report = explore(
        &client(&server),
        LocalStorage::new(temp_dir.path()),
        "00200521",
        1000,
    )
    .await
    .unwrap();

    assert_eq!(report.table_count, 1);
    assert!(report.data.is_none());
    assert!(report.fetch_error.is_some());
}
