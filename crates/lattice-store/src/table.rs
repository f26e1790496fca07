//! Generic multi-index table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// A record storable in a [`Table`].
pub trait Row: Clone + Send + Sync + 'static {
    /// Primary key type. Unique per table.
    type Key: Ord + Clone + Send + Sync;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The named index is not declared in the table's schema. A
    /// programming error, not a data condition.
    #[error("unknown index: {0}")]
    UnknownIndex(String),
}

/// Declaration of a named, non-unique integer secondary index.
pub struct IndexSpec<R: Row> {
    pub name: &'static str,
    pub key_of: fn(&R) -> i64,
}

#[derive(Clone)]
struct Index<R: Row> {
    name: &'static str,
    key_of: fn(&R) -> i64,
    entries: BTreeMap<i64, BTreeSet<R::Key>>,
}

impl<R: Row> Index<R> {
    fn add(&mut self, row: &R, key: &R::Key) {
        self.entries
            .entry((self.key_of)(row))
            .or_default()
            .insert(key.clone());
    }

    fn remove(&mut self, row: &R, key: &R::Key) {
        let value = (self.key_of)(row);
        if let Some(keys) = self.entries.get_mut(&value) {
            keys.remove(key);
            if keys.is_empty() {
                self.entries.remove(&value);
            }
        }
    }
}

/// An in-memory table with a unique primary index and zero or more named
/// integer secondary indexes.
///
/// Rows are held behind `Arc`, so cloning a table shares row storage;
/// clones diverge structurally as they are mutated. This is what makes
/// whole-state clones in write transactions affordable.
#[derive(Clone)]
pub struct Table<R: Row> {
    rows: BTreeMap<R::Key, Arc<R>>,
    indexes: Vec<Index<R>>,
}

impl<R: Row> Table<R> {
    pub fn new(indexes: Vec<IndexSpec<R>>) -> Self {
        Self {
            rows: BTreeMap::new(),
            indexes: indexes
                .into_iter()
                .map(|spec| Index {
                    name: spec.name,
                    key_of: spec.key_of,
                    entries: BTreeMap::new(),
                })
                .collect(),
        }
    }

    /// The row with the given primary key, if any. Absence is a normal
    /// result, not an error.
    pub fn first(&self, key: &R::Key) -> Option<&R> {
        self.rows.get(key).map(Arc::as_ref)
    }

    /// Insert or replace by primary key, updating every secondary index.
    pub fn insert(&mut self, row: R) {
        let key = row.key();
        if let Some(old) = self.rows.get(&key).cloned() {
            for index in &mut self.indexes {
                index.remove(&old, &key);
            }
        }
        for index in &mut self.indexes {
            index.add(&row, &key);
        }
        self.rows.insert(key, Arc::new(row));
    }

    /// Delete by primary key. Returns whether a row was removed.
    pub fn delete(&mut self, key: &R::Key) -> bool {
        match self.rows.remove(key) {
            Some(old) => {
                for index in &mut self.indexes {
                    index.remove(&old, key);
                }
                true
            }
            None => false,
        }
    }

    /// Delete every listed primary key, returning the number removed.
    pub fn delete_all<I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = R::Key>,
    {
        keys.into_iter().filter(|key| self.delete(key)).count()
    }

    /// All rows whose `index` value equals `key`.
    pub fn get(
        &self,
        index: &str,
        key: i64,
    ) -> Result<impl Iterator<Item = &R> + '_, StoreError> {
        let index = self.index(index)?;
        Ok(index
            .entries
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(move |k| self.rows.get(k).map(Arc::as_ref)))
    }

    /// Rows whose `index` value is `<= key`, highest values first. The
    /// order of rows sharing an index value is unspecified.
    pub fn reverse_lower_bound(
        &self,
        index: &str,
        key: i64,
    ) -> Result<impl Iterator<Item = &R> + '_, StoreError> {
        let index = self.index(index)?;
        Ok(index
            .entries
            .range(..=key)
            .rev()
            .flat_map(|(_, keys)| keys.iter())
            .filter_map(move |k| self.rows.get(k).map(Arc::as_ref)))
    }

    /// All rows in primary-key order.
    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.rows.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index(&self, name: &str) -> Result<&Index<R>, StoreError> {
        self.indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| StoreError::UnknownIndex(name.to_string()))
    }
}
