use std::collections::HashMap;

use serde_json::Value;

use crate::entity::EntityKind;

/// Read-through cache of raw upstream catalog records.
///
/// Entries appear only as a side effect of successful fetch tools; reads
/// never trigger network traffic and nothing is ever evicted. Per kind, the
/// insertion order of the first write is preserved and is not disturbed when
/// an entry is overwritten.
#[derive(Debug, Default)]
pub struct CacheStore {
    shelves: [Shelf; 3],
}

#[derive(Debug, Default)]
struct Shelf {
    order: Vec<String>,
    entries: HashMap<String, Value>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-known record for (kind, id), if any tool has fetched it.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Value> {
        self.shelves[kind as usize].entries.get(id)
    }

    /// Insert or replace the whole record for (kind, id). The replacement is
    /// atomic from a reader's point of view; the last writer wins.
    pub fn put(&mut self, kind: EntityKind, id: impl Into<String>, entry: Value) {
        let shelf = &mut self.shelves[kind as usize];
        let id = id.into();
        if !shelf.entries.contains_key(&id) {
            shelf.order.push(id.clone());
        }
        shelf.entries.insert(id, entry);
    }

    /// All records of one kind, in first-write insertion order.
    pub fn list(&self, kind: EntityKind) -> impl Iterator<Item = (&str, &Value)> {
        let shelf = &self.shelves[kind as usize];
        shelf
            .order
            .iter()
            .filter_map(move |id| shelf.entries.get(id).map(|entry| (id.as_str(), entry)))
    }
}
