//! Undo log for staged pool operations
//!
//! While a journal is open every overwritten entry is recorded with its
//! previous value. Rolling back replays the records newest first, so an
//! operation costs space proportional to the entries it touched.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::secondary::DepositLookup;

#[derive(Debug, Clone)]
pub(crate) struct JournaledMap<V> {
    entries: HashMap<String, V>,
    undo: Option<Vec<(String, Option<V>)>>,
}

impl<V> Default for JournaledMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            undo: None,
        }
    }
}

impl<V: Clone> JournaledMap<V> {
    pub(crate) fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub(crate) fn insert(&mut self, key: &str, value: V) {
        let previous = self.entries.insert(key.to_string(), value);
        if let Some(undo) = &mut self.undo {
            undo.push((key.to_string(), previous));
        }
    }

    pub(crate) fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    pub(crate) fn commit(&mut self) {
        self.undo = None;
    }

    pub(crate) fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for (key, previous) in undo.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

impl<V> FromIterator<(String, V)> for JournaledMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            undo: None,
        }
    }
}

impl DepositLookup for JournaledMap<Decimal> {
    fn deposit_of(&self, account: &str) -> Decimal {
        self.entries.get(account).copied().unwrap_or(Decimal::ZERO)
    }
}
