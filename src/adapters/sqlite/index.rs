use super::{json_column, open_connection};
use crate::domain::model::IndexedTable;
use crate::utils::error::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const SELECT_COLUMNS: &str = "stats_data_id, table_name, description, organization, field_code, \
     field_name, keywords, available_areas, categories";

/// Searchable index of statistics tables used by the query translator.
#[derive(Debug, Clone)]
pub struct TableIndex {
    path: PathBuf,
}

fn db_create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS stats_tables (
            stats_data_id TEXT PRIMARY KEY,
            table_name TEXT NOT NULL,
            description TEXT,
            organization TEXT,
            field_code TEXT,
            field_name TEXT,
            keywords TEXT,
            available_areas TEXT,
            categories TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
}

fn map_indexed_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexedTable> {
    Ok(IndexedTable {
        stats_data_id: row.get(0)?,
        table_name: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        organization: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        field_code: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        field_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        keywords: json_column(row, 6)?,
        available_areas: json_column(row, 7)?,
        categories: json_column(row, 8)?,
    })
}

fn db_upsert(conn: &Connection, table: &IndexedTable) -> Result<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO stats_tables
            (stats_data_id, table_name, description, organization, field_code, field_name,
             keywords, available_areas, categories)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            table.stats_data_id,
            table.table_name,
            table.description,
            table.organization,
            table.field_code,
            table.field_name,
            serde_json::to_string(&table.keywords)?,
            serde_json::to_string(&table.available_areas)?,
            serde_json::to_string(&table.categories)?,
        ],
    )?;
    Ok(())
}

impl TableIndex {
    /// Opens the index, creating it with `seed` rows when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, seed: &[IndexedTable]) -> Result<Self> {
        let path = path.into();
        let is_new = !path.exists();

        let mut conn = open_connection(&path)?;
        db_create_schema(&conn)?;

        if is_new && !seed.is_empty() {
            let tx = conn.transaction()?;
            for table in seed {
                db_upsert(&tx, table)?;
            }
            tx.commit()?;
            tracing::debug!("Seeded new index {} with {} tables", path.display(), seed.len());
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        open_connection(&self.path)
    }

    pub fn upsert(&self, tables: &[IndexedTable]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for table in tables {
            db_upsert(&tx, table)?;
        }
        tx.commit()?;
        Ok(tables.len())
    }

    /// Tables whose keywords contain any of `terms`; every table when `terms` is empty.
    pub fn search(&self, terms: &[String]) -> Result<Vec<IndexedTable>> {
        let conn = self.connect()?;

        let sql = if terms.is_empty() {
            format!("SELECT {} FROM stats_tables ORDER BY stats_data_id", SELECT_COLUMNS)
        } else {
            let predicate = (1..=terms.len())
                .map(|i| format!("keywords LIKE ?{}", i))
                .collect::<Vec<_>>()
                .join(" OR ");
            format!(
                "SELECT {} FROM stats_tables WHERE {} ORDER BY stats_data_id",
                SELECT_COLUMNS, predicate
            )
        };

        let patterns: Vec<String> = terms.iter().map(|t| format!("%{}%", t)).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(patterns.iter()), map_indexed_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get(&self, stats_data_id: &str) -> Result<Option<IndexedTable>> {
        let conn = self.connect()?;
        let table = conn
            .query_row(
                &format!("SELECT {} FROM stats_tables WHERE stats_data_id = ?1", SELECT_COLUMNS),
                params![stats_data_id],
                map_indexed_row,
            )
            .optional()?;
        Ok(table)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stats_tables", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn table(id: &str, keywords: &[&str]) -> IndexedTable {
        IndexedTable {
            stats_data_id: id.to_string(),
            table_name: format!("table {}", id),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            available_areas: vec!["全国".to_string()],
            categories: BTreeMap::from([(
                "cdCat01".to_string(),
                BTreeMap::from([("001".to_string(), "総数".to_string())]),
            )]),
            ..Default::default()
        }
    }

    #[test]
    fn test_seed_only_on_creation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.db");

        let index = TableIndex::open(&path, &[table("0000000001", &["人口"])]).unwrap();
        assert_eq!(index.count().unwrap(), 1);

        let reopened = TableIndex::open(&path, &[table("0000000002", &["賃金"])]).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert!(reopened.get("0000000002").unwrap().is_none());
    }

    #[test]
    fn test_search_matches_any_term() {
        let temp_dir = TempDir::new().unwrap();
        let index = TableIndex::open(temp_dir.path().join("index.db"), &[]).unwrap();
        index
            .upsert(&[
                table("0000000003", &["賃金"]),
                table("0000000001", &["人口", "年齢"]),
                table("0000000002", &["労働", "失業率"]),
            ])
            .unwrap();

        let hits = index
            .search(&["人口".to_string(), "失業率".to_string()])
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|t| t.stats_data_id.as_str()).collect();
        assert_eq!(ids, vec!["0000000001", "0000000002"]);
        assert_eq!(hits[0].keywords, vec!["人口", "年齢"]);
        assert_eq!(hits[0].categories["cdCat01"]["001"], "総数");

        assert_eq!(index.search(&[]).unwrap().len(), 3);
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let temp_dir = TempDir::new().unwrap();
        let index = TableIndex::open(temp_dir.path().join("index.db"), &[]).unwrap();
        index.upsert(&[table("0000000001", &["人口"])]).unwrap();

        let mut updated = table("0000000001", &["世帯"]);
        updated.description = "世帯数".to_string();
        index.upsert(&[updated]).unwrap();

        let stored = index.get("0000000001").unwrap().unwrap();
        assert_eq!(stored.description, "世帯数");
        assert_eq!(stored.keywords, vec!["世帯"]);
        assert_eq!(index.count().unwrap(), 1);
    }
}
