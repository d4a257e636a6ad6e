use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One `TABLE_INF` entry of a `getStatsList` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    #[serde(rename = "TABLE_INF")]
    pub table_id: String,
    #[serde(rename = "STAT_CODE")]
    pub stat_code: String,
    #[serde(rename = "STAT_NAME")]
    pub stat_name: String,
    #[serde(rename = "GOV_ORG_CODE")]
    pub gov_org_code: String,
    #[serde(rename = "GOV_ORG")]
    pub gov_org: String,
    #[serde(rename = "STATISTICS_NAME")]
    pub statistics_name: String,
    #[serde(rename = "TITLE")]
    pub title: String,
    #[serde(rename = "CYCLE")]
    pub cycle: String,
    #[serde(rename = "SURVEY_DATE")]
    pub survey_date: String,
    #[serde(rename = "OPEN_DATE")]
    pub open_date: String,
    #[serde(rename = "SMALL_AREA")]
    pub small_area: bool,
    #[serde(rename = "COLLECT_AREA")]
    pub collect_area: String,
    #[serde(rename = "MAIN_CATEGORY_CODE")]
    pub main_category_code: String,
    #[serde(rename = "MAIN_CATEGORY")]
    pub main_category: String,
    #[serde(rename = "SUB_CATEGORY_CODE")]
    pub sub_category_code: String,
    #[serde(rename = "SUB_CATEGORY")]
    pub sub_category: String,
    #[serde(rename = "OVERALL_TOTAL_NUMBER")]
    pub overall_total_number: u64,
    #[serde(rename = "UPDATED_DATE")]
    pub updated_date: String,
}

impl StatsTable {
    pub const CSV_HEADERS: [&'static str; 18] = [
        "TABLE_INF",
        "STAT_CODE",
        "STAT_NAME",
        "GOV_ORG_CODE",
        "GOV_ORG",
        "STATISTICS_NAME",
        "TITLE",
        "CYCLE",
        "SURVEY_DATE",
        "OPEN_DATE",
        "SMALL_AREA",
        "COLLECT_AREA",
        "MAIN_CATEGORY_CODE",
        "MAIN_CATEGORY",
        "SUB_CATEGORY_CODE",
        "SUB_CATEGORY",
        "OVERALL_TOTAL_NUMBER",
        "UPDATED_DATE",
    ];

    /// Field values in `CSV_HEADERS` order.
    pub fn csv_fields(&self) -> Vec<String> {
        vec![
            self.table_id.clone(),
            self.stat_code.clone(),
            self.stat_name.clone(),
            self.gov_org_code.clone(),
            self.gov_org.clone(),
            self.statistics_name.clone(),
            self.title.clone(),
            self.cycle.clone(),
            self.survey_date.clone(),
            self.open_date.clone(),
            if self.small_area { "1" } else { "0" }.to_string(),
            self.collect_area.clone(),
            self.main_category_code.clone(),
            self.main_category.clone(),
            self.sub_category_code.clone(),
            self.sub_category.clone(),
            self.overall_total_number.to_string(),
            self.updated_date.clone(),
        ]
    }
}

/// A `CLASS` entry: one value along an axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisValue {
    pub code: String,
    pub name: String,
    pub level: String,
    pub unit: String,
    pub parent_code: String,
}

/// A `CLASS_OBJ`: a classification axis such as `tab`, `cat01`, `area` or `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub id: String,
    pub name: String,
    pub values: Vec<AxisValue>,
}

impl Axis {
    pub fn label(&self, code: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.code == code)
            .map(|v| v.name.as_str())
    }

    pub fn is_time(&self) -> bool {
        self.id == "time" || self.name.contains("時間")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_id: String,
    pub axes: Vec<Axis>,
}

/// One `VALUE` cell of a `getStatsData` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// (axis id, class code) pairs in the order the table declares its axes.
    pub dimensions: Vec<(String, String)>,
    pub unit: Option<String>,
    /// Cell text as published; suppressed cells use markers like `-`, `x`, `…`.
    pub raw_value: String,
    pub value: Option<f64>,
}

impl Observation {
    pub fn code(&self, axis_id: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(id, _)| id == axis_id)
            .map(|(_, code)| code.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time_code: String,
    pub time_label: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    pub unit: Option<String>,
    pub points: Vec<SeriesPoint>,
}

/// Tabular result of `getStatsData`, possibly merged from several pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsFrame {
    pub stats_data_id: String,
    pub title: String,
    pub total_number: u64,
    pub axes: Vec<Axis>,
    pub observations: Vec<Observation>,
}

impl StatsFrame {
    pub fn axis(&self, axis_id: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.id == axis_id)
    }

    pub fn label(&self, axis_id: &str, code: &str) -> Option<&str> {
        self.axis(axis_id).and_then(|a| a.label(code))
    }

    pub fn time_axis(&self) -> Option<&Axis> {
        self.axes.iter().find(|a| a.is_time())
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.axes.len() * 2 + 2);
        for axis in &self.axes {
            columns.push(format!("{}_code", axis.id));
            columns.push(axis.name.clone());
        }
        columns.push("unit".to_string());
        columns.push("value".to_string());
        columns
    }

    pub fn row(&self, observation: &Observation) -> Vec<String> {
        let mut row = Vec::with_capacity(self.axes.len() * 2 + 2);
        for axis in &self.axes {
            let code = observation.code(&axis.id).unwrap_or_default();
            row.push(code.to_string());
            row.push(axis.label(code).unwrap_or(code).to_string());
        }
        row.push(observation.unit.clone().unwrap_or_default());
        row.push(observation.raw_value.clone());
        row
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.observations.iter().map(|o| self.row(o)).collect()
    }

    /// Time series along the time axis with every other axis held at the
    /// codes of the first observation.
    pub fn series(&self) -> Option<TimeSeries> {
        let time_axis = self.time_axis()?;
        let first = self.observations.first()?;

        let fixed: Vec<(&str, &str)> = first
            .dimensions
            .iter()
            .filter(|(id, _)| id != &time_axis.id)
            .map(|(id, code)| (id.as_str(), code.as_str()))
            .collect();

        let mut points: Vec<SeriesPoint> = self
            .observations
            .iter()
            .filter(|o| {
                fixed
                    .iter()
                    .all(|(axis_id, code)| o.code(axis_id) == Some(*code))
            })
            .filter_map(|o| {
                let time_code = o.code(&time_axis.id)?;
                Some(SeriesPoint {
                    time_code: time_code.to_string(),
                    time_label: time_axis.label(time_code).unwrap_or(time_code).to_string(),
                    value: o.value,
                })
            })
            .collect();
        points.sort_by(|a, b| a.time_code.cmp(&b.time_code));

        let name = fixed
            .iter()
            .map(|(axis_id, code)| self.label(axis_id, code).unwrap_or(code).to_string())
            .collect::<Vec<_>>()
            .join("・");

        Some(TimeSeries {
            name,
            unit: first.unit.clone(),
            points,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub frame: StatsFrame,
    pub csv_output: String,
    pub tsv_output: String,
    pub series: Option<TimeSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Age,
    Gender,
    Industry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePeriod {
    /// Four-digit year as written in the query, leading zeros included.
    Year(String),
    Latest,
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePeriod::Year(year) => write!(f, "{}", year),
            TimePeriod::Latest => write!(f, "latest"),
        }
    }
}

/// Entities recognised in a free-text query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub regions: Vec<String>,
    pub time_periods: Vec<TimePeriod>,
    pub categories: Vec<QueryCategory>,
    pub statistical_items: Vec<String>,
}

impl EntitySet {
    pub fn has_category(&self, category: QueryCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn wants_latest(&self) -> bool {
        self.time_periods.contains(&TimePeriod::Latest)
    }

    pub fn first_year(&self) -> Option<&str> {
        self.time_periods.iter().find_map(|p| match p {
            TimePeriod::Year(year) => Some(year.as_str()),
            TimePeriod::Latest => None,
        })
    }
}

/// A table the query translator can choose from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedTable {
    pub stats_data_id: String,
    pub table_name: String,
    pub description: String,
    pub organization: String,
    pub field_code: String,
    pub field_name: String,
    pub keywords: Vec<String>,
    /// Area levels the table is published at: 全国, 都道府県, 市区町村.
    pub available_areas: Vec<String>,
    /// Parameter name (`cdCat01`, ...) to code → label.
    pub categories: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub stats_data_id: String,
    pub parameters: BTreeMap<String, String>,
    pub description: String,
    pub confidence_score: f64,
    pub table_name: String,
    pub alternative_suggestions: Vec<QueryResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorSuggestion {
    #[serde(default)]
    pub stats_table_id: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub axis_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}
