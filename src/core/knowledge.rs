//! Static knowledge the query translator relies on.

use crate::domain::model::IndexedTable;
use std::collections::BTreeMap;

/// Area names to e-Stat `cdArea` codes. Order is significant: it is the order
/// in which regions are reported when a query mentions several names.
pub const AREA_MAPPINGS: &[(&str, &str)] = &[
    ("全国", "00000"),
    ("北海道", "01000"),
    ("青森", "02000"),
    ("青森県", "02000"),
    ("岩手", "03000"),
    ("岩手県", "03000"),
    ("宮城", "04000"),
    ("宮城県", "04000"),
    ("秋田", "05000"),
    ("秋田県", "05000"),
    ("山形", "06000"),
    ("山形県", "06000"),
    ("福島", "07000"),
    ("福島県", "07000"),
    ("茨城", "08000"),
    ("茨城県", "08000"),
    ("栃木", "09000"),
    ("栃木県", "09000"),
    ("群馬", "10000"),
    ("群馬県", "10000"),
    ("埼玉", "11000"),
    ("埼玉県", "11000"),
    ("千葉", "12000"),
    ("千葉県", "12000"),
    ("東京", "13000"),
    ("東京都", "13000"),
    ("神奈川", "14000"),
    ("神奈川県", "14000"),
    ("新潟", "15000"),
    ("新潟県", "15000"),
    ("富山", "16000"),
    ("富山県", "16000"),
    ("石川", "17000"),
    ("石川県", "17000"),
    ("福井", "18000"),
    ("福井県", "18000"),
    ("山梨", "19000"),
    ("山梨県", "19000"),
    ("長野", "20000"),
    ("長野県", "20000"),
    ("岐阜", "21000"),
    ("岐阜県", "21000"),
    ("静岡", "22000"),
    ("静岡県", "22000"),
    ("愛知", "23000"),
    ("愛知県", "23000"),
    ("三重", "24000"),
    ("三重県", "24000"),
    ("滋賀", "25000"),
    ("滋賀県", "25000"),
    ("京都", "26000"),
    ("京都府", "26000"),
    ("大阪", "27000"),
    ("大阪府", "27000"),
    ("兵庫", "28000"),
    ("兵庫県", "28000"),
    ("奈良", "29000"),
    ("奈良県", "29000"),
    ("和歌山", "30000"),
    ("和歌山県", "30000"),
    ("鳥取", "31000"),
    ("鳥取県", "31000"),
    ("島根", "32000"),
    ("島根県", "32000"),
    ("岡山", "33000"),
    ("岡山県", "33000"),
    ("広島", "34000"),
    ("広島県", "34000"),
    ("山口", "35000"),
    ("山口県", "35000"),
    ("徳島", "36000"),
    ("徳島県", "36000"),
    ("香川", "37000"),
    ("香川県", "37000"),
    ("愛媛", "38000"),
    ("愛媛県", "38000"),
    ("高知", "39000"),
    ("高知県", "39000"),
    ("福岡", "40000"),
    ("福岡県", "40000"),
    ("佐賀", "41000"),
    ("佐賀県", "41000"),
    ("長崎", "42000"),
    ("長崎県", "42000"),
    ("熊本", "43000"),
    ("熊本県", "43000"),
    ("大分", "44000"),
    ("大分県", "44000"),
    ("宮崎", "45000"),
    ("宮崎県", "45000"),
    ("鹿児島", "46000"),
    ("鹿児島県", "46000"),
    ("沖縄", "47000"),
    ("沖縄県", "47000"),
];

pub const NATIONWIDE: &str = "全国";
pub const PREFECTURE_LEVEL: &str = "都道府県";
pub const MUNICIPALITY_LEVEL: &str = "市区町村";

/// Statistical items and the survey names that imply them.
pub const STATS_KEYWORDS: &[(&str, &[&str])] = &[
    ("人口", &["国勢調査", "人口推計", "住民基本台帳"]),
    ("失業率", &["労働力調査", "完全失業率"]),
    ("雇用", &["労働力調査", "就業構造基本調査"]),
    ("賃金", &["毎月勤労統計", "賃金構造基本統計"]),
    ("物価", &["消費者物価指数", "企業物価指数"]),
    ("GDP", &["国民経済計算", "GDP"]),
    ("家計", &["家計調査", "家計収支"]),
    ("企業", &["法人企業統計", "企業活動基本調査"]),
    ("建設", &["建設工事統計", "建築着工統計"]),
    ("農業", &["農林業センサス", "作物統計"]),
    ("工業", &["工業統計", "鉱工業指数"]),
    ("商業", &["商業統計", "商業販売統計"]),
];

/// Keywords attached to catalog rows, derived from statistics name and title.
pub const CATALOG_KEYWORD_PATTERNS: &[(&str, &[&str])] = &[
    ("人口", &["人口", "国勢", "住民"]),
    ("労働", &["労働", "雇用", "失業", "就業"]),
    ("賃金", &["賃金", "給与", "所得"]),
    ("物価", &["物価", "価格", "指数"]),
    ("家計", &["家計", "消費", "支出"]),
    ("企業", &["企業", "法人", "会社"]),
    ("建設", &["建設", "建築", "住宅"]),
    ("農業", &["農業", "農林", "作物"]),
    ("工業", &["工業", "製造", "生産"]),
    ("商業", &["商業", "小売", "卸売"]),
];

pub fn area_code(name: &str) -> Option<&'static str> {
    AREA_MAPPINGS
        .iter()
        .find(|(area, _)| *area == name)
        .map(|(_, code)| *code)
}

pub fn extract_catalog_keywords(stat_name: &str, title: &str) -> Vec<String> {
    let text = format!("{} {}", stat_name, title).to_lowercase();
    CATALOG_KEYWORD_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| text.contains(p)))
        .map(|(keyword, _)| keyword.to_string())
        .collect()
}

fn code_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Frequently used tables, seeded into a freshly created index.
pub fn sample_tables() -> Vec<IndexedTable> {
    vec![
        IndexedTable {
            stats_data_id: "0000020101".to_string(),
            table_name: "人口推計".to_string(),
            description: "人口推計（月報）".to_string(),
            keywords: strings(&["人口", "推計"]),
            available_areas: strings(&[NATIONWIDE, PREFECTURE_LEVEL]),
            categories: BTreeMap::from([
                (
                    "cdCat01".to_string(),
                    code_map(&[("001", "総人口"), ("002", "男"), ("003", "女")]),
                ),
                (
                    "cdCat02".to_string(),
                    code_map(&[
                        ("01", "総数"),
                        ("02", "0～14歳"),
                        ("03", "15～64歳"),
                        ("04", "65歳以上"),
                    ]),
                ),
            ]),
            ..Default::default()
        },
        IndexedTable {
            stats_data_id: "0003084821".to_string(),
            table_name: "国勢調査".to_string(),
            description: "人口等基本集計（年齢・男女別人口）".to_string(),
            keywords: strings(&["人口", "年齢", "男女"]),
            available_areas: strings(&[NATIONWIDE, PREFECTURE_LEVEL, MUNICIPALITY_LEVEL]),
            categories: BTreeMap::from([
                (
                    "cdCat01".to_string(),
                    code_map(&[("01000", "総数"), ("01001", "0歳"), ("01002", "1歳")]),
                ),
                (
                    "cdCat02".to_string(),
                    code_map(&[("001", "総数"), ("002", "男"), ("003", "女")]),
                ),
            ]),
            ..Default::default()
        },
        IndexedTable {
            stats_data_id: "0003191203".to_string(),
            table_name: "労働力調査".to_string(),
            description: "労働力調査（基本集計）".to_string(),
            keywords: strings(&["労働", "雇用", "失業率"]),
            available_areas: strings(&[NATIONWIDE]),
            categories: BTreeMap::from([
                (
                    "cdCat01".to_string(),
                    code_map(&[("11020", "完全失業率"), ("10101", "就業者数")]),
                ),
                (
                    "cdCat02".to_string(),
                    code_map(&[("001", "総数"), ("002", "男"), ("003", "女")]),
                ),
            ]),
            ..Default::default()
        },
    ]
}
