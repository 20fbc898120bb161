use std::collections::btree_map::{self, Entry};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::RangeBounds;

use crate::error::{NaturwbError, Result};

/// Ordered table keyed by a composite identifier.
///
/// Inserting a key twice is an error: every join in the engine is done by key
/// lookup, never by position, so a duplicate would silently double-count area.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedTable<K: Ord, V> {
    name: &'static str,
    rows: BTreeMap<K, V>,
}

impl<K: Ord + Debug, V> KeyedTable<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: BTreeMap::new(),
        }
    }

    /// Build a table from `(key, value)` pairs, rejecting duplicate keys.
    pub fn from_rows<I>(name: &'static str, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut table = Self::new(name);
        for (key, value) in rows {
            table.insert(key, value)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        match self.rows.entry(key) {
            Entry::Occupied(entry) => Err(NaturwbError::DuplicateKey {
                table: self.name,
                key: format!("{:?}", entry.key()),
            }),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.rows.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, V> {
        self.rows.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, K, V> {
        self.rows.values()
    }

    pub fn range<R: RangeBounds<K>>(&self, range: R) -> btree_map::Range<'_, K, V> {
        self.rows.range(range)
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a KeyedTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = btree_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Sum values per group key. Groups appear in key order.
pub fn group_sum<K, I, F>(rows: I, key_of: F) -> BTreeMap<K, f64>
where
    K: Ord,
    I: IntoIterator,
    F: Fn(&I::Item) -> (K, f64),
{
    let mut sums = BTreeMap::new();
    for row in rows {
        let (key, value) = key_of(&row);
        *sums.entry(key).or_insert(0.0) += value;
    }
    sums
}

/// Divide `part` by its group `total`, refusing to divide by a zero total.
pub fn share(part: f64, total: f64, group: impl Debug) -> Result<f64> {
    if total > 0.0 {
        Ok(part / total)
    } else {
        Err(NaturwbError::ZeroAreaGroup {
            group: format!("{group:?}"),
        })
    }
}
