//! Readers for the e-Stat JSON rendering of the API's XML documents.
//!
//! The JSON endpoints mirror the XML tree: attributes become `@name`
//! members, element text becomes either the bare value or a `$` member when
//! the element also has attributes, and an element that occurs once is an
//! object while a repeated element is an array.

use crate::domain::model::{Axis, AxisValue, Observation, StatsFrame, StatsTable, TableMetadata};
use crate::utils::error::{EstatError, Result};
use serde_json::Value;

/// RESULT.STATUS of a successful call that matched nothing.
pub const STATUS_NO_DATA: i64 = 1;
/// RESULT.STATUS of a call that succeeded but ignored some parameters.
pub const STATUS_PARTIAL: i64 = 2;
/// Statuses at or above this value are errors.
pub const STATUS_ERROR_THRESHOLD: i64 = 100;

pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

pub fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Object(map)) => text_of(map.get("$")),
        _ => String::new(),
    }
}

pub fn attr_of(value: Option<&Value>, name: &str) -> String {
    match value {
        Some(Value::Object(map)) => text_of(map.get(&format!("@{}", name))),
        _ => String::new(),
    }
}

/// Parses a published cell value. Suppression markers and non-finite values yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiStatus {
    pub status: i64,
    pub message: String,
}

impl ApiStatus {
    pub fn is_no_data(&self) -> bool {
        self.status == STATUS_NO_DATA
    }
}

fn envelope<'a>(root: &'a Value, name: &str) -> Result<&'a Value> {
    root.get(name)
        .ok_or_else(|| EstatError::UnexpectedResponseError {
            endpoint: name.to_string(),
            message: format!("missing {} element", name),
        })
}

pub fn check_result(envelope: &Value, endpoint: &str) -> Result<ApiStatus> {
    let result = envelope.get("RESULT");
    let status_text = text_of(result.and_then(|r| r.get("STATUS")));
    let status = status_text
        .parse::<i64>()
        .map_err(|_| EstatError::UnexpectedResponseError {
            endpoint: endpoint.to_string(),
            message: format!("invalid RESULT.STATUS '{}'", status_text),
        })?;
    let message = text_of(result.and_then(|r| r.get("ERROR_MSG")));

    if status >= STATUS_ERROR_THRESHOLD {
        return Err(EstatError::ApiStatusError { status, message });
    }
    if status == STATUS_PARTIAL {
        tracing::warn!("⚠️ {} succeeded partially: {}", endpoint, message);
    }
    Ok(ApiStatus { status, message })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsListPage {
    pub total: u64,
    pub next_key: Option<u64>,
    pub tables: Vec<StatsTable>,
}

pub fn parse_stats_list(root: &Value) -> Result<StatsListPage> {
    let body = envelope(root, "GET_STATS_LIST")?;
    let status = check_result(body, "getStatsList")?;
    if status.is_no_data() {
        return Ok(StatsListPage::default());
    }

    let datalist = body.get("DATALIST_INF");
    let tables = as_list(datalist.and_then(|d| d.get("TABLE_INF")))
        .into_iter()
        .map(parse_table)
        .collect();

    Ok(StatsListPage {
        total: text_of(datalist.and_then(|d| d.get("NUMBER")))
            .parse()
            .unwrap_or(0),
        next_key: next_key(datalist.and_then(|d| d.get("RESULT_INF"))),
        tables,
    })
}

fn next_key(result_inf: Option<&Value>) -> Option<u64> {
    text_of(result_inf.and_then(|r| r.get("NEXT_KEY")))
        .parse()
        .ok()
}

pub fn parse_table(table: &Value) -> StatsTable {
    let field = |name: &str| table.get(name);
    StatsTable {
        table_id: attr_of(Some(table), "id"),
        stat_code: attr_of(field("STAT_NAME"), "code"),
        stat_name: text_of(field("STAT_NAME")),
        gov_org_code: attr_of(field("GOV_ORG"), "code"),
        gov_org: text_of(field("GOV_ORG")),
        statistics_name: text_of(field("STATISTICS_NAME")),
        title: text_of(field("TITLE")),
        cycle: text_of(field("CYCLE")),
        survey_date: text_of(field("SURVEY_DATE")),
        open_date: text_of(field("OPEN_DATE")),
        small_area: text_of(field("SMALL_AREA")) == "1",
        collect_area: text_of(field("COLLECT_AREA")),
        main_category_code: attr_of(field("MAIN_CATEGORY"), "code"),
        main_category: text_of(field("MAIN_CATEGORY")),
        sub_category_code: attr_of(field("SUB_CATEGORY"), "code"),
        sub_category: text_of(field("SUB_CATEGORY")),
        overall_total_number: text_of(field("OVERALL_TOTAL_NUMBER"))
            .parse()
            .unwrap_or(0),
        updated_date: text_of(field("UPDATED_DATE")),
    }
}

pub fn parse_axes(class_inf: Option<&Value>) -> Vec<Axis> {
    as_list(class_inf.and_then(|c| c.get("CLASS_OBJ")))
        .into_iter()
        .map(|obj| Axis {
            id: attr_of(Some(obj), "id"),
            name: attr_of(Some(obj), "name"),
            values: as_list(obj.get("CLASS"))
                .into_iter()
                .map(|class| AxisValue {
                    code: attr_of(Some(class), "code"),
                    name: attr_of(Some(class), "name"),
                    level: attr_of(Some(class), "level"),
                    unit: attr_of(Some(class), "unit"),
                    parent_code: attr_of(Some(class), "parentCode"),
                })
                .collect(),
        })
        .collect()
}

pub fn parse_meta_info(root: &Value, table_id: &str) -> Result<TableMetadata> {
    let body = envelope(root, "GET_META_INFO")?;
    check_result(body, "getMetaInfo")?;

    let class_inf = body
        .get("METADATA_INF")
        .and_then(|m| m.get("CLASS_INF"));

    Ok(TableMetadata {
        table_id: table_id.to_string(),
        axes: parse_axes(class_inf),
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsDataPage {
    pub frame: StatsFrame,
    pub next_key: Option<u64>,
}

pub fn parse_stats_data(root: &Value, stats_data_id: &str) -> Result<StatsDataPage> {
    let body = envelope(root, "GET_STATS_DATA")?;
    let status = check_result(body, "getStatsData")?;
    if status.is_no_data() {
        return Ok(StatsDataPage {
            frame: StatsFrame {
                stats_data_id: stats_data_id.to_string(),
                ..Default::default()
            },
            next_key: None,
        });
    }

    let data = body.get("STATISTICAL_DATA");
    let result_inf = data.and_then(|d| d.get("RESULT_INF"));
    let table_inf = data.and_then(|d| d.get("TABLE_INF"));
    let axes = parse_axes(data.and_then(|d| d.get("CLASS_INF")));

    let observations = as_list(
        data.and_then(|d| d.get("DATA_INF"))
            .and_then(|d| d.get("VALUE")),
    )
    .into_iter()
    .map(|value| parse_observation(value, &axes))
    .collect();

    let title = match text_of(table_inf.and_then(|t| t.get("TITLE"))) {
        title if title.is_empty() => text_of(table_inf.and_then(|t| t.get("STATISTICS_NAME"))),
        title => title,
    };

    Ok(StatsDataPage {
        frame: StatsFrame {
            stats_data_id: stats_data_id.to_string(),
            title,
            total_number: text_of(result_inf.and_then(|r| r.get("TOTAL_NUMBER")))
                .parse()
                .unwrap_or(0),
            axes,
            observations,
        },
        next_key: next_key(result_inf),
    })
}

fn parse_observation(value: &Value, axes: &[Axis]) -> Observation {
    let mut dimensions: Vec<(String, String)> = axes
        .iter()
        .filter_map(|axis| {
            let code = attr_of(Some(value), &axis.id);
            (!code.is_empty()).then(|| (axis.id.clone(), code))
        })
        .collect();

    // CLASS_INF に現れない次元属性も落とさない
    if let Value::Object(map) = value {
        for (key, attr) in map {
            let Some(id) = key.strip_prefix('@') else {
                continue;
            };
            if id == "unit" || id == "annotation" || axes.iter().any(|a| a.id == id) {
                continue;
            }
            dimensions.push((id.to_string(), text_of(Some(attr))));
        }
    }

    let raw_value = text_of(Some(value));
    let unit = attr_of(Some(value), "unit");
    Observation {
        dimensions,
        unit: (!unit.is_empty()).then_some(unit),
        value: parse_number(&raw_value),
        raw_value,
    }
}
