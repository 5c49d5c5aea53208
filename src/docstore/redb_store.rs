//! A [`DocStore`] implementation backed by `redb`, a pure-Rust embedded KV
//! store with ACID transactions — the same storage engine the system this
//! crate's design was modeled on uses for its typed collections, here
//! generalised to hold arbitrary named collections of [`Document`] rows.
//!
//! Each collection is a redb table named `docs_<collection>`, keyed by the
//! row's `_m_id` field and storing the `bincode`-encoded [`Document`] as the
//! value. Table names must be `'static` for `redb::TableDefinition`; since
//! collection names are only known at runtime, each distinct name is leaked
//! once and the resulting `&'static str` cached, bounding total leaked
//! memory by the number of distinct collections ever opened in the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info, instrument};

use crate::docstore::{DocStore, Filter};
use crate::error::{DocStoreError, Result};
use crate::types::{Document, FIELD_ID};

const TABLE_PREFIX: &str = "docs_";

/// A `redb`-backed [`DocStore`].
pub struct RedbDocStore {
    db: Database,
    path: PathBuf,
    table_names: RwLock<HashMap<String, &'static str>>,
}

impl RedbDocStore {
    /// Opens (creating if absent) a document store at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        info!("opened document store");
        Ok(Self {
            db,
            path: path.to_path_buf(),
            table_names: RwLock::new(HashMap::new()),
        })
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table_name(&self, collection: &str) -> &'static str {
        if let Some(&name) = self.table_names.read().expect("lock poisoned").get(collection) {
            return name;
        }
        let leaked: &'static str =
            Box::leak(format!("{TABLE_PREFIX}{collection}").into_boxed_str());
        self.table_names
            .write()
            .expect("lock poisoned")
            .insert(collection.to_string(), leaked);
        leaked
    }

    fn table_def(&self, collection: &str) -> TableDefinition<'static, u32, &'static [u8]> {
        TableDefinition::new(self.table_name(collection))
    }
}

fn row_id(row: &Document) -> Result<u32> {
    row.get(FIELD_ID)
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .ok_or_else(|| DocStoreError::Serialization(format!("row is missing {FIELD_ID}")).into())
}

impl DocStore for RedbDocStore {
    #[instrument(skip(self, rows), fields(collection, count = rows.len()))]
    fn insert_many(&self, collection: &str, rows: Vec<Document>) -> Result<()> {
        let table_def = self.table_def(collection);
        let txn = self.db.begin_write().map_err(DocStoreError::from)?;
        {
            let mut table = txn.open_table(table_def).map_err(DocStoreError::from)?;
            for row in &rows {
                let id = row_id(row)?;
                let encoded = bincode::serialize(row).map_err(DocStoreError::from)?;
                table
                    .insert(id, encoded.as_slice())
                    .map_err(DocStoreError::from)?;
            }
        }
        txn.commit().map_err(DocStoreError::from)?;
        debug!("inserted rows");
        Ok(())
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let table_def = self.table_def(collection);
        let txn = self.db.begin_read().map_err(DocStoreError::from)?;
        let table = match txn.open_table(table_def) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(DocStoreError::from(err).into()),
        };

        let mut out = Vec::new();
        for entry in table.iter().map_err(DocStoreError::from)? {
            let (_, value) = entry.map_err(DocStoreError::from)?;
            let doc: Document = bincode::deserialize(value.value()).map_err(DocStoreError::from)?;
            if filter.matches(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    fn drop_collection(&self, collection: &str) -> Result<()> {
        let table_def = self.table_def(collection);
        let txn = self.db.begin_write().map_err(DocStoreError::from)?;
        txn.delete_table(table_def).map_err(DocStoreError::from)?;
        txn.commit().map_err(DocStoreError::from)?;
        info!("dropped collection");
        Ok(())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read().map_err(DocStoreError::from)?;
        let names = txn
            .list_tables()
            .map_err(DocStoreError::from)?
            .filter_map(|handle| {
                handle
                    .name()
                    .strip_prefix(TABLE_PREFIX)
                    .map(|name| name.to_string())
            })
            .collect();
        Ok(names)
    }
}
