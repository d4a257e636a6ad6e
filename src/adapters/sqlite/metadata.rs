use super::open_connection;
use crate::domain::model::{AxisValue, StatsTable, TableMetadata};
use crate::utils::error::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Local cache of table lists and table axes fetched from e-Stat.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxisSummary {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextTable {
    pub table_id: String,
    pub stat_name: String,
    pub title: String,
    pub gov_org: String,
    pub survey_date: String,
    pub total_number: u64,
    pub axes: Vec<AxisSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubcategoryGroup {
    pub name: String,
    pub tables: Vec<ContextTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub name: String,
    pub subcategories: Vec<SubcategoryGroup>,
}

/// Cached tables grouped by main and sub category, in category-code order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogContext {
    pub total: usize,
    pub updated: String,
    pub categories: Vec<CategoryGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxisDetail {
    pub axis_id: String,
    pub axis_name: String,
    pub class_name: String,
    pub unit: String,
    pub values: Vec<AxisValue>,
}

fn db_create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS stats_tables (
            table_id TEXT PRIMARY KEY,
            stat_id TEXT,
            gov_org TEXT,
            stat_name TEXT,
            title TEXT,
            cycle TEXT,
            survey_date TEXT,
            open_date TEXT,
            small_area INTEGER,
            main_category_code TEXT,
            main_category TEXT,
            sub_category_code TEXT,
            sub_category TEXT,
            overall_total_number INTEGER,
            updated_date TEXT,
            cached_at TEXT
        );

        CREATE TABLE IF NOT EXISTS table_metadata (
            table_id TEXT,
            class_obj_id TEXT,
            class_obj_name TEXT,
            class_name TEXT,
            level TEXT,
            unit TEXT,
            PRIMARY KEY (table_id, class_obj_id)
        );

        CREATE TABLE IF NOT EXISTS class_values (
            table_id TEXT,
            class_obj_id TEXT,
            class_code TEXT,
            class_name TEXT,
            level TEXT,
            parent_code TEXT,
            PRIMARY KEY (table_id, class_obj_id, class_code)
        );
        "#,
    )
}

fn db_load_axes(conn: &Connection, table_id: &str) -> rusqlite::Result<Vec<AxisSummary>> {
    let mut stmt = conn.prepare(
        "SELECT class_obj_id, class_obj_name, class_name, unit FROM table_metadata \
         WHERE table_id = ?1 ORDER BY class_obj_id",
    )?;
    let axes = stmt
        .query_map(params![table_id], |row| {
            Ok(AxisSummary {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                class_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                unit: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(axes)
}

impl MetadataCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = open_connection(&path)?;
        db_create_schema(&conn)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        open_connection(&self.path)
    }

    pub fn save_stats_tables(&self, tables: &[StatsTable]) -> Result<usize> {
        let cached_at = chrono::Local::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for table in tables {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO stats_tables
                    (table_id, stat_id, gov_org, stat_name, title, cycle, survey_date,
                     open_date, small_area, main_category_code, main_category,
                     sub_category_code, sub_category, overall_total_number, updated_date, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
                params![
                    table.table_id,
                    table.stat_code,
                    table.gov_org,
                    table.stat_name,
                    table.title,
                    table.cycle,
                    table.survey_date,
                    table.open_date,
                    table.small_area as i64,
                    table.main_category_code,
                    table.main_category,
                    table.sub_category_code,
                    table.sub_category,
                    table.overall_total_number as i64,
                    table.updated_date,
                    cached_at,
                ],
            )?;
        }
        tx.commit()?;
        tracing::info!("💾 Saved {} tables to the metadata cache", tables.len());
        Ok(tables.len())
    }

    pub fn save_table_metadata(&self, metadata: &TableMetadata) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        for axis in &metadata.axes {
            let first = axis.values.first();
            tx.execute(
                r#"
                INSERT OR REPLACE INTO table_metadata
                    (table_id, class_obj_id, class_obj_name, class_name, level, unit)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    metadata.table_id,
                    axis.id,
                    axis.name,
                    first.map(|v| v.name.as_str()).unwrap_or_default(),
                    first.map(|v| v.level.as_str()).unwrap_or_default(),
                    first.map(|v| v.unit.as_str()).unwrap_or_default(),
                ],
            )?;

            for value in &axis.values {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO class_values
                        (table_id, class_obj_id, class_code, class_name, level, parent_code)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        metadata.table_id,
                        axis.id,
                        value.code,
                        value.name,
                        value.level,
                        value.parent_code,
                    ],
                )?;
            }
        }

        tx.commit()?;
        tracing::debug!("💾 Saved metadata of {}", metadata.table_id);
        Ok(())
    }

    pub fn table_count(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stats_tables", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Every cached table with its axes, grouped for use as LLM prompt context.
    pub fn load_llm_context(&self) -> Result<CatalogContext> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT table_id, stat_name, title, main_category, sub_category,
                   gov_org, survey_date, overall_total_number
            FROM stats_tables
            ORDER BY main_category_code, sub_category_code, table_id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    ContextTable {
                        table_id: row.get(0)?,
                        stat_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        gov_org: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        survey_date: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        total_number: row.get::<_, Option<i64>>(7)?.unwrap_or(0).max(0) as u64,
                        axes: Vec::new(),
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut context = CatalogContext {
            total: rows.len(),
            updated: chrono::Local::now().format("%Y-%m-%d").to_string(),
            categories: Vec::new(),
        };

        for (main_category, sub_category, mut table) in rows {
            table.axes = db_load_axes(&conn, &table.table_id)?;

            let idx = match context
                .categories
                .iter()
                .position(|c| c.name == main_category)
            {
                Some(idx) => idx,
                None => {
                    context.categories.push(CategoryGroup {
                        name: main_category,
                        subcategories: Vec::new(),
                    });
                    context.categories.len() - 1
                }
            };
            let category = &mut context.categories[idx];

            match category
                .subcategories
                .iter_mut()
                .find(|s| s.name == sub_category)
            {
                Some(sub) => sub.tables.push(table),
                None => category.subcategories.push(SubcategoryGroup {
                    name: sub_category,
                    tables: vec![table],
                }),
            }
        }

        Ok(context)
    }

    pub fn get_table_axis_details(&self, table_id: &str) -> Result<Vec<AxisDetail>> {
        let conn = self.connect()?;
        let axes = db_load_axes(&conn, table_id)?;

        let mut stmt = conn.prepare(
            "SELECT class_code, class_name, level, parent_code FROM class_values \
             WHERE table_id = ?1 AND class_obj_id = ?2 ORDER BY class_code",
        )?;

        let mut details = Vec::with_capacity(axes.len());
        for axis in axes {
            let values = stmt
                .query_map(params![table_id, axis.id], |row| {
                    Ok(AxisValue {
                        code: row.get(0)?,
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        level: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        unit: String::new(),
                        parent_code: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            details.push(AxisDetail {
                axis_id: axis.id,
                axis_name: axis.name,
                class_name: axis.class_name,
                unit: axis.unit,
                values,
            });
        }

        Ok(details)
    }
}
