#![forbid(unsafe_code)]

//! Plain key/value mappings handed to views.
//!
//! [`Props`] is a reference-counted, copy-on-write `BTreeMap`. Cloning is an
//! `Rc` bump and preserves identity; any mutation through a shared handle
//! detaches a fresh map first, so a value observed by one holder never
//! changes underneath it.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::shallow::shallow_equal;
use crate::value::Value;

/// A plain mapping from string keys to [`Value`]s.
#[derive(Clone, Default)]
pub struct Props {
    entries: Rc<BTreeMap<String, Value>>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        Rc::make_mut(&mut self.entries).insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if !self.entries.contains_key(key) {
            return None;
        }
        Rc::make_mut(&mut self.entries).remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Copy every entry of `other` into `self`; `other` wins on conflicts.
    pub fn extend_from(&mut self, other: &Props) {
        if other.is_empty() {
            return;
        }
        let entries = Rc::make_mut(&mut self.entries);
        for (k, v) in other.entries.iter() {
            entries.insert(k.clone(), v.clone());
        }
    }

    /// Whether both handles share the same underlying map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    /// Key-wise identity comparison. See [`shallow_equal`].
    #[must_use]
    pub fn shallow_eq(&self, other: &Props) -> bool {
        shallow_equal(self, other)
    }
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.entries == other.entries
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>();
        Self {
            entries: Rc::new(entries),
        }
    }
}
