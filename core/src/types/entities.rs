use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Entity names that describe identity, never filename entities
pub const IDENTITY_ENTITIES: [&str; 2] = ["subject", "session"];

/// Ordered BIDS entity labels (entity name -> label)
///
/// Keys are unique and insertion-ordered. `subject` and `session` are
/// identity, not entities, and are refused by [`Entities::insert`] and
/// dropped when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Entities(IndexMap<String, String>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a label, returning false for identity keys
    pub fn insert(&mut self, name: impl Into<String>, label: impl Into<String>) -> bool {
        let name = name.into();
        if IDENTITY_ENTITIES.contains(&name.as_str()) {
            return false;
        }
        self.0.insert(name, label.into());
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns a copy ordered by `order`; names missing from `order` keep
    /// their relative order and go last
    pub fn reordered<S: AsRef<str>>(&self, order: &[S]) -> Self {
        let mut ordered = IndexMap::with_capacity(self.0.len());
        for name in order {
            if let Some(label) = self.0.get(name.as_ref()) {
                ordered.insert(name.as_ref().to_string(), label.clone());
            }
        }
        for (name, label) in &self.0 {
            if !ordered.contains_key(name) {
                ordered.insert(name.clone(), label.clone());
            }
        }
        Self(ordered)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Entities {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entities = Entities::new();
        for (k, v) in iter {
            entities.insert(k, v);
        }
        entities
    }
}

impl<'de> Deserialize<'de> for Entities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IndexMap::<String, String>::deserialize(deserializer).map(|map| map.into_iter().collect())
    }
}
