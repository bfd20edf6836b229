//! Identifier translation between Themis and Odoo.
//!
//! Every migrated entity type produces an [`IdMapping`] from the source ids
//! taken out of its rows and the ids returned by the destination `create`
//! call. Later entity types resolve their foreign keys through it. Lookups
//! never fail: an unknown source id resolves to [`Ref::NONE`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value as Json};
use tracing::{error, info};

/// A resolved destination reference, or the neutral reference.
///
/// The neutral reference is rendered as `false`, which the destination reads
/// as "no relation".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ref(Option<i64>);

impl Ref {
    /// The neutral reference.
    pub const NONE: Ref = Ref(None);

    pub fn some(id: i64) -> Self {
        Ref(Some(id))
    }

    pub fn id(self) -> Option<i64> {
        self.0
    }

    pub fn is_set(self) -> bool {
        self.0.is_some()
    }

    /// First resolved reference of the two.
    pub fn or(self, other: Ref) -> Ref {
        if self.is_set() {
            self
        } else {
            other
        }
    }

    pub fn to_json(self) -> Json {
        match self.0 {
            Some(id) => Json::from(id),
            None => Json::Bool(false),
        }
    }

    /// Many2many "replace with" command holding this single id, or `false`.
    pub fn to_replace_command(self) -> Json {
        match self.0 {
            Some(id) => json!([[6, 0, [id]]]),
            None => Json::Bool(false),
        }
    }
}

impl Serialize for Ref {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(id) => serializer.serialize_i64(id),
            None => serializer.serialize_bool(false),
        }
    }
}

/// Source id to destination id for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    entries: HashMap<i64, i64>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip source ids against the ids the destination created for them.
    ///
    /// Both lists must have the same length and order. On mismatch nothing
    /// can be trusted, so the mapping is empty. The boolean is `false` in that
    /// case.
    pub fn from_created(entity: &str, source_ids: &[Option<i64>], created: &[i64]) -> (Self, bool) {
        if source_ids.len() != created.len() {
            error!(
                "{}: destination returned {} ids for {} source records, mapping discarded",
                entity,
                created.len(),
                source_ids.len()
            );
            return (Self::new(), false);
        }

        let entries = source_ids
            .iter()
            .zip(created)
            .filter_map(|(source, dest)| source.map(|s| (s, *dest)))
            .collect();
        info!("Created {} {}.", created.len(), entity);
        (Self { entries }, true)
    }

    pub fn insert(&mut self, source: i64, dest: i64) {
        self.entries.insert(source, dest);
    }

    pub fn get(&self, source: i64) -> Option<i64> {
        self.entries.get(&source).copied()
    }

    /// Resolve an optional source id, neutral when absent or unknown.
    pub fn resolve(&self, source: Option<i64>) -> Ref {
        Ref(source.and_then(|s| self.get(s)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(i64, i64)> for IdMapping {
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
