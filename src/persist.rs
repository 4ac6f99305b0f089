use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const TABLES_DIR: &str = "csv";

/// Byte-level access to named tables. The store owns encoding; a port only
/// moves whole files.
pub trait Persistence {
    fn read(&self, table: &str) -> Result<Option<Vec<u8>>>;
    fn write(&mut self, table: &str, bytes: &[u8]) -> Result<()>;
}

/// `<workspace>/csv/<table>.csv`
#[derive(Debug, Clone)]
pub struct CsvDir {
    dir: PathBuf,
}

impl CsvDir {
    pub fn open(workspace: &Path) -> Result<CsvDir> {
        let dir = workspace.join(TABLES_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(TABLES_DIR, e))?;
        Ok(CsvDir { dir })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }
}

impl Persistence for CsvDir {
    fn read(&self, table: &str) -> Result<Option<Vec<u8>>> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read(&path)
            .map(Some)
            .map_err(|e| StoreError::io(table, e))
    }

    fn write(&mut self, table: &str, bytes: &[u8]) -> Result<()> {
        let path = self.table_path(table);
        let tmp = self.dir.join(format!("{}.csv.writing", table));
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(table, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(table, e))
    }
}

/// In-memory tables. Clones share the same map, so a test can keep a handle
/// after moving one into a store.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    tables: std::rc::Rc<std::cell::RefCell<std::collections::HashMap<String, Vec<u8>>>>,
}

#[cfg(test)]
impl MemoryTables {
    pub fn text(&self, table: &str) -> String {
        self.tables
            .borrow()
            .get(table)
            .map(|b| String::from_utf8_lossy(b).to_string())
            .unwrap_or_default()
    }

    pub fn put(&self, table: &str, text: &str) {
        self.tables
            .borrow_mut()
            .insert(table.to_string(), text.as_bytes().to_vec());
    }
}

#[cfg(test)]
impl Persistence for MemoryTables {
    fn read(&self, table: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.borrow().get(table).cloned())
    }

    fn write(&mut self, table: &str, bytes: &[u8]) -> Result<()> {
        self.tables
            .borrow_mut()
            .insert(table.to_string(), bytes.to_vec());
        Ok(())
    }
}

pub fn decode_table<R: DeserializeOwned>(table: &str, bytes: &[u8]) -> Result<Vec<R>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    rdr.deserialize()
        .collect::<std::result::Result<Vec<R>, _>>()
        .map_err(|e| StoreError::csv(table, e))
}

/// Header row is always written, so an empty collection still round-trips.
pub fn encode_table<R: Serialize>(table: &str, headers: &[&str], rows: &[R]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(headers)
        .map_err(|e| StoreError::csv(table, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| StoreError::csv(table, e))?;
    }
    wtr.into_inner().map_err(|e| StoreError::Corrupt {
        table: table.to_string(),
        message: e.to_string(),
    })
}
