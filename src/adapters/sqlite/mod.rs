pub mod index;
pub mod metadata;

pub use index::TableIndex;
pub use metadata::MetadataCache;

use crate::utils::error::Result;
use rusqlite::types::Type;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::path::Path;

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Connection::open(path)?)
}

/// Decodes a JSON text column; NULL or empty text yields the default value.
fn json_column<T: DeserializeOwned + Default>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: Option<String> = row.get(idx)?;
    match text.as_deref() {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str(text)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))),
    }
}
