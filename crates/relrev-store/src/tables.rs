use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::schema::{Collection, Key};

/// One collection's rows plus its key generator.
#[derive(Clone, Debug)]
pub(crate) struct Table {
    rows: BTreeMap<Key, Value>,
    next_id: u64,
    bytes: u64,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            bytes: 0,
        }
    }
}

impl Table {
    pub(crate) fn from_rows(rows: Vec<(Key, Value)>, next_id: u64) -> StoreResult<Self> {
        let mut table = Self {
            next_id: next_id.max(1),
            ..Self::default()
        };
        for (key, value) in rows {
            table.bytes += record_size(&key, &value)?;
            if let Key::Auto(n) = key {
                table.next_id = table.next_id.max(n + 1);
            }
            table.rows.insert(key, value);
        }
        Ok(table)
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.rows.iter()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn get(&self, key: &Key) -> Option<&Value> {
        self.rows.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Insert without a quota check; returns the replaced record.
    pub(crate) fn insert(&mut self, key: Key, value: Value, size: u64) -> Option<Value> {
        if let Key::Auto(n) = key {
            self.next_id = self.next_id.max(n + 1);
        }
        self.bytes += size;
        let prior = self.rows.insert(key.clone(), value);
        if let Some(old) = &prior {
            self.bytes -= record_size(&key, old).unwrap_or(0);
        }
        prior
    }

    fn remove(&mut self, key: &Key) -> Option<Value> {
        let old = self.rows.remove(key)?;
        self.bytes -= record_size(key, &old).unwrap_or(0);
        Some(old)
    }
}

/// Size of a record as counted against the quota.
pub(crate) fn record_size(key: &Key, value: &Value) -> StoreResult<u64> {
    Ok(key.byte_len() + serde_json::to_vec(value)?.len() as u64)
}

/// What it takes to reverse one applied change.
#[derive(Debug)]
pub(crate) enum Undo {
    Row {
        key: Key,
        prior: Option<Value>,
        next_id: u64,
    },
    Table(Table),
}

/// All collections of one store, with quota accounting.
///
/// Changes are applied in place and hand back an [`Undo`]; a backend that
/// fails to make a change durable passes it to [`Tables::rollback`] before
/// releasing its lock, so readers never see a change that was not kept.
#[derive(Debug)]
pub(crate) struct Tables {
    tables: BTreeMap<Collection, Table>,
    quota: Option<u64>,
}

impl Tables {
    pub(crate) fn new(quota: Option<u64>) -> Self {
        Self {
            tables: Collection::ALL
                .into_iter()
                .map(|c| (c, Table::default()))
                .collect(),
            quota,
        }
    }

    pub(crate) fn table(&self, collection: Collection) -> &Table {
        // Every collection is inserted at construction and never removed.
        &self.tables[&collection]
    }

    fn table_mut(&mut self, collection: Collection) -> &mut Table {
        self.tables.entry(collection).or_default()
    }

    pub(crate) fn bytes_used(&self) -> u64 {
        self.tables.values().map(|t| t.bytes).sum()
    }

    pub(crate) fn quota(&self) -> Option<u64> {
        self.quota
    }

    pub(crate) fn get(&self, collection: Collection, key: &Key) -> Option<Value> {
        self.table(collection).rows.get(key).cloned()
    }

    pub(crate) fn entries(&self, collection: Collection) -> Vec<(Key, Value)> {
        self.table(collection)
            .rows
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn scan(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        if !collection.schema().has_index(index) {
            return Err(StoreError::UnknownIndex {
                collection,
                index: index.to_string(),
            });
        }
        Ok(self
            .table(collection)
            .rows
            .values()
            .filter(|record| record.get(index) == Some(value))
            .cloned()
            .collect())
    }

    /// Install a table read from disk.
    pub(crate) fn load(&mut self, collection: Collection, table: Table) {
        self.tables.insert(collection, table);
    }

    pub(crate) fn put(&mut self, collection: Collection, key: Key, value: Value) -> StoreResult<Undo> {
        let new_size = record_size(&key, &value)?;
        let old_size = match self.table(collection).rows.get(&key) {
            Some(old) => record_size(&key, old)?,
            None => 0,
        };
        self.check_quota(collection, old_size, new_size)?;

        let table = self.table_mut(collection);
        let next_id = table.next_id;
        let prior = table.insert(key.clone(), value, new_size);
        Ok(Undo::Row { key, prior, next_id })
    }

    /// Store `value` under the next generated key, writing that key into the
    /// record's key path.
    pub(crate) fn add(&mut self, collection: Collection, mut value: Value) -> StoreResult<(u64, Undo)> {
        let schema = collection.schema();
        if !schema.auto_increment {
            return Err(StoreError::NotAutoIncrement(collection));
        }
        let id = self.table(collection).next_id;
        match value.as_object_mut() {
            Some(record) => {
                record.insert(schema.key_path.to_string(), Value::from(id));
            }
            None => {
                return Err(StoreError::Serialization(format!(
                    "records added to {collection} must be objects"
                )))
            }
        }
        let undo = self.put(collection, Key::Auto(id), value)?;
        Ok((id, undo))
    }

    /// `None` when the key is absent and nothing changed.
    pub(crate) fn delete(&mut self, collection: Collection, key: &Key) -> Option<Undo> {
        let table = self.table_mut(collection);
        let next_id = table.next_id;
        let prior = table.remove(key)?;
        Some(Undo::Row {
            key: key.clone(),
            prior: Some(prior),
            next_id,
        })
    }

    /// Empty the collection but keep its key generator.
    pub(crate) fn clear(&mut self, collection: Collection) -> Undo {
        let table = self.table_mut(collection);
        let emptied = Table {
            next_id: table.next_id,
            ..Table::default()
        };
        Undo::Table(std::mem::replace(table, emptied))
    }

    pub(crate) fn rollback(&mut self, collection: Collection, undo: Undo) {
        let table = self.table_mut(collection);
        match undo {
            Undo::Row { key, prior, next_id } => {
                table.remove(&key);
                if let Some(value) = prior {
                    let size = record_size(&key, &value).unwrap_or(0);
                    table.insert(key, value, size);
                }
                table.next_id = next_id;
            }
            Undo::Table(previous) => *table = previous,
        }
    }

    fn check_quota(&self, collection: Collection, old_size: u64, new_size: u64) -> StoreResult<()> {
        let Some(quota) = self.quota else {
            return Ok(());
        };
        let others = self.bytes_used() - old_size;
        if others + new_size > quota {
            return Err(StoreError::QuotaExceeded {
                collection,
                needed: new_size,
                available: quota.saturating_sub(others),
            });
        }
        Ok(())
    }
}
