//! Assigns catalog tables to the major statistical fields.

use crate::domain::model::StatsTable;
use serde::Serialize;
use std::collections::BTreeMap;

pub const UNCLASSIFIED_FIELD: &str = "99";

pub const MAJOR_FIELDS: &[(&str, &str)] = &[
    ("00", "国勢統計"),
    ("01", "人口・世帯"),
    ("02", "自然環境・災害"),
    ("03", "労働・賃金"),
    ("04", "農林水産業"),
    ("05", "鉱工業"),
    ("06", "商業・サービス業"),
    ("07", "企業・家計・経済"),
    ("08", "住宅・土地・建設"),
    ("09", "エネルギー・水"),
    ("10", "運輸・観光"),
    ("11", "情報通信・科学技術"),
    ("12", "教育・文化・スポーツ・生活"),
    ("13", "行財政"),
    ("14", "司法・安全・環境"),
    ("99", "その他"),
];

const FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    ("01", &["人口", "世帯", "国勢調査", "住民基本台帳"]),
    ("02", &["災害", "環境", "気象", "地震"]),
    ("03", &["労働", "賃金", "雇用", "失業", "就業"]),
    ("04", &["農業", "林業", "水産", "漁業", "畜産"]),
    ("05", &["鉱業", "工業", "製造業", "生産"]),
    ("06", &["商業", "サービス", "小売", "卸売"]),
    ("07", &["企業", "家計", "経済", "GDP", "所得", "消費"]),
    ("08", &["住宅", "土地", "建設", "不動産"]),
    ("09", &["エネルギー", "電力", "ガス", "水道"]),
    ("10", &["運輸", "交通", "観光", "旅行"]),
    ("11", &["情報", "通信", "科学", "技術", "研究"]),
    ("12", &["教育", "文化", "スポーツ", "生活", "学校"]),
    ("13", &["行政", "財政", "税収", "予算"]),
    ("14", &["司法", "安全", "犯罪", "警察", "消防"]),
];

/// Tables per field code. Fields without tables are absent.
pub type FieldCatalogs = BTreeMap<String, Vec<StatsTable>>;

pub fn field_name(field_code: &str) -> &'static str {
    MAJOR_FIELDS
        .iter()
        .find(|(code, _)| *code == field_code)
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

fn matches_field(table: &StatsTable, keywords: &[&str]) -> bool {
    [&table.stat_name, &table.gov_org, &table.main_category]
        .iter()
        .map(|text| text.to_lowercase())
        .any(|text| {
            keywords
                .iter()
                .any(|keyword| text.contains(&keyword.to_lowercase()))
        })
}

/// A table can belong to several fields; tables matching none go to `99`.
pub fn classify_by_field(tables: &[StatsTable]) -> FieldCatalogs {
    let mut catalogs = FieldCatalogs::new();
    let mut classified = vec![false; tables.len()];

    for (field_code, keywords) in FIELD_KEYWORDS {
        let members: Vec<StatsTable> = tables
            .iter()
            .enumerate()
            .filter(|(_, table)| matches_field(table, keywords))
            .map(|(i, table)| {
                classified[i] = true;
                table.clone()
            })
            .collect();

        if !members.is_empty() {
            tracing::info!(
                "分野 {} ({}): {}件",
                field_code,
                field_name(field_code),
                members.len()
            );
            catalogs.insert(field_code.to_string(), members);
        }
    }

    let unclassified: Vec<StatsTable> = tables
        .iter()
        .zip(&classified)
        .filter(|(_, done)| !**done)
        .map(|(table, _)| table.clone())
        .collect();
    if !unclassified.is_empty() {
        tracing::info!("分野 99 (その他): {}件", unclassified.len());
        catalogs.insert(UNCLASSIFIED_FIELD.to_string(), unclassified);
    }

    catalogs
}

/// One survey (statistics name + organisation) within a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogIndexEntry {
    pub field_code: String,
    pub field_name: String,
    pub stat_name: String,
    pub organization: String,
    pub table_count: usize,
    pub latest_survey: Option<String>,
}

pub fn catalog_index(catalogs: &FieldCatalogs) -> Vec<CatalogIndexEntry> {
    let mut entries = Vec::new();

    for (field_code, tables) in catalogs {
        let mut surveys: BTreeMap<(&str, &str), (usize, Option<&str>)> = BTreeMap::new();
        for table in tables {
            let entry = surveys
                .entry((table.stat_name.as_str(), table.gov_org.as_str()))
                .or_insert((0, None));
            entry.0 += 1;
            if !table.survey_date.is_empty() {
                entry.1 = entry.1.max(Some(table.survey_date.as_str()));
            }
        }

        entries.extend(surveys.into_iter().map(|((stat_name, organization), (count, latest))| {
            CatalogIndexEntry {
                field_code: field_code.clone(),
                field_name: field_name(field_code).to_string(),
                stat_name: stat_name.to_string(),
                organization: organization.to_string(),
                table_count: count,
                latest_survey: latest.map(str::to_string),
            }
        }));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str, stat_name: &str, gov_org: &str, survey_date: &str) -> StatsTable {
        StatsTable {
            table_id: id.to_string(),
            stat_name: stat_name.to_string(),
            gov_org: gov_org.to_string(),
            survey_date: survey_date.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_multi_field_and_unclassified() {
        let tables = vec![
            table("1", "国勢調査", "総務省", "202001"),
            table("2", "労働力調査", "総務省", "202301"),
            table("3", "学校基本調査", "文部科学省", "202305"),
            table("4", "人権擁護統計", "法務省", "202212"),
        ];

        let catalogs = classify_by_field(&tables);

        assert_eq!(catalogs["01"].len(), 1);
        assert_eq!(catalogs["03"][0].table_id, "2");
        assert_eq!(catalogs["12"][0].table_id, "3");
        assert_eq!(catalogs["99"][0].table_id, "4");
        assert!(!catalogs.contains_key("02"));
    }

    #[test]
    fn test_table_can_belong_to_several_fields() {
        let tables = vec![table("1", "家計調査（二人以上の世帯）", "総務省", "")];
        let catalogs = classify_by_field(&tables);
        let fields: Vec<_> = catalogs.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["01", "07"]);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let catalogs = classify_by_field(&[table("1", "四半期別gdp速報", "内閣府", "")]);
        assert!(catalogs.contains_key("07"));
    }

    #[test]
    fn test_field_name_lookup() {
        assert_eq!(field_name("03"), "労働・賃金");
        assert_eq!(field_name("42"), "unknown");
    }

    #[test]
    fn test_catalog_index_groups_surveys() {
        let catalogs = classify_by_field(&[
            table("1", "労働力調査", "総務省", "202301"),
            table("2", "労働力調査", "総務省", "202305"),
            table("3", "毎月勤労統計調査", "厚生労働省", ""),
        ]);

        let index = catalog_index(&catalogs);
        assert_eq!(index.len(), 2);
        let labour = index
            .iter()
            .find(|e| e.stat_name == "労働力調査")
            .unwrap();
        assert_eq!(labour.table_count, 2);
        assert_eq!(labour.latest_survey.as_deref(), Some("202305"));
        assert_eq!(labour.field_name, "労働・賃金");

        let wages = index
            .iter()
            .find(|e| e.stat_name == "毎月勤労統計調査")
            .unwrap();
        assert_eq!(wages.latest_survey, None);
    }
}
