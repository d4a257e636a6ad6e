use estat_explorer::app::{update_catalog_and_sync, CatalogDownloader, CatalogSync};
use estat_explorer::config::settings::EstatSettings;
use estat_explorer::{EstatClient, TableIndex};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn catalog_response() -> serde_json::Value {
    json!({
        "GET_STATS_LIST": {
            "RESULT": {"STATUS": 0, "ERROR_MSG": "正常に終了しました。"},
            "DATALIST_INF": {
                "NUMBER": 3,
                "RESULT_INF": {"FROM_NUMBER": 1, "TO_NUMBER": 3},
                "TABLE_INF": [
                    {
                        "@id": "0003410379",
                        "STAT_NAME": {"@code": "00200521", "$": "国勢調査"},
                        "GOV_ORG": {"@code": "00200", "$": "総務省"},
                        "TITLE": "男女別人口",
                        "SURVEY_DATE": "202010",
                        "SMALL_AREA": 1,
                        "MAIN_CATEGORY": {"@code": "02", "$": "人口・世帯"}
                    },
                    {
                        "@id": "0003191203",
                        "STAT_NAME": {"@code": "00450011", "$": "労働力調査"},
                        "GOV_ORG": {"@code": "00450", "$": "総務省"},
                        "TITLE": {"@no": "1", "$": "就業状態別15歳以上人口"},
                        "SURVEY_DATE": "202301",
                        "SMALL_AREA": 0,
                        "MAIN_CATEGORY": {"@code": "03", "$": "労働・賃金"}
                    },
                    {
                        "@id": "0003000001",
                        "STAT_NAME": {"@code": "00250011", "$": "人権擁護統計"},
                        "GOV_ORG": {"@code": "00250", "$": "法務省"},
                        "TITLE": "人権侵犯事件の受理件数",
                        "SURVEY_DATE": "2022"
                    }
                ]
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

fn read_without_bom(path: &std::path::Path) -> String {
    let bytes = std::fs::read(path).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"), "{} has no BOM", path.display());
    String::from_utf8(bytes[3..].to_vec()).unwrap()
}

#[tokio::test]
async fn test_download_classify_save_and_sync() {
    let temp_dir = TempDir::new().unwrap();
    let catalog_dir = temp_dir.path().join("estat_catalog");
    let server = MockServer::start_async().await;

    let list_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsList");
            then.status(200).json_body(catalog_response());
        })
        .await;

    let downloader = CatalogDownloader::new(client(&server), &catalog_dir);
    let tables = downloader.download_all(100).await.unwrap();
    list_mock.assert_async().await;
    assert_eq!(tables.len(), 3);
    assert_eq!(tables[1].title, "就業状態別15歳以上人口");

    let catalogs = downloader.classify(&tables);
    assert_eq!(
        catalogs.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["01", "03", "99"]
    );

    let saved = downloader.save_catalogs(&catalogs).unwrap();
    assert_eq!(saved.field_files.len(), 3);
    assert!(saved.field_files[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("01_人口・世帯_"));

    let combined = read_without_bom(saved.combined.as_ref().unwrap());
    let mut lines = combined.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("TABLE_INF,STAT_CODE,STAT_NAME"));
    assert!(header.ends_with("FIELD_CODE,FIELD_NAME"));
    assert_eq!(lines.count(), 3);
    assert!(combined.contains("0003410379,00200521,国勢調査"));
    assert!(combined.contains(",99,その他"));

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved.summary).unwrap()).unwrap();
    assert_eq!(summary["total_records"], 3);
    assert_eq!(summary["field_summary"]["03"]["name"], "労働・賃金");
    assert_eq!(summary["field_summary"]["03"]["survey_years"], json!(["202301"]));

    let index = TableIndex::open(temp_dir.path().join("catalog_index.db"), &[]).unwrap();
    let sync = CatalogSync::new(&catalog_dir, index.clone());
    assert_eq!(sync.sync_catalog_to_index().unwrap(), 3);
    assert_eq!(index.count().unwrap(), 3);

    let labour = index.get("0003191203").unwrap().unwrap();
    assert_eq!(labour.field_code, "03");
    assert_eq!(labour.keywords, vec!["人口", "労働"]);
}

#[tokio::test]
async fn test_catalog_index_groups_surveys() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsList");
            then.status(200).json_body(catalog_response());
        })
        .await;

    let downloader = CatalogDownloader::new(client(&server), temp_dir.path());
    let tables = downloader.download_all(100).await.unwrap();
    let catalogs = downloader.classify(&tables);

    let (entries, path) = downloader.create_catalog_index(&catalogs).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].stat_name, "国勢調査");
    assert_eq!(entries[0].latest_survey.as_deref(), Some("202010"));

    let content = read_without_bom(&path);
    assert!(content.starts_with("field_code,field_name,stat_name,organization,table_count,latest_survey"));
}

#[tokio::test]
async fn test_download_by_field_narrows_to_survey() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let labour_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/json/getStatsList")
                .query_param("statsCode", "00450011");
            then.status(200).json_body(catalog_response());
        })
        .await;

    let downloader = CatalogDownloader::new(client(&server), temp_dir.path());
    let tables = downloader.download_by_field("03", 100).await.unwrap();

    labour_mock.assert_async().await;
    assert_eq!(tables.len(), 3);
}

#[tokio::test]
async fn test_update_catalog_and_sync() {
    let temp_dir = TempDir::new().unwrap();
    let catalog_dir = temp_dir.path().join("estat_catalog");
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsList");
            then.status(200).json_body(catalog_response());
        })
        .await;

    let downloader = CatalogDownloader::new(client(&server), &catalog_dir);
    let index = TableIndex::open(temp_dir.path().join("catalog_index.db"), &[]).unwrap();
    let sync = CatalogSync::new(&catalog_dir, index.clone());

    let synced = update_catalog_and_sync(&downloader, &sync, 100).await.unwrap();
    assert_eq!(synced, 3);
    assert!(index.get("0003410379").unwrap().is_some());
}

#[tokio::test]
async fn test_update_with_empty_catalog_syncs_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let catalog_dir = temp_dir.path().join("estat_catalog");
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/json/getStatsList");
            then.status(200).json_body(json!({
                "GET_STATS_LIST": {"RESULT": {"STATUS": 1, "ERROR_MSG": "該当データはありませんでした。"}}
            }));
        })
        .await;

    let downloader = CatalogDownloader::new(client(&server), &catalog_dir);
    let index = TableIndex::open(temp_dir.path().join("catalog_index.db"), &[]).unwrap();
    let sync = CatalogSync::new(&catalog_dir, index.clone());

    assert_eq!(update_catalog_and_sync(&downloader, &sync, 100).await.unwrap(), 0);
    assert!(!catalog_dir.exists());
    assert_eq!(index.count().unwrap(), 0);
}
