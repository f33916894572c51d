//! In-memory to-do collection that converges under remote change events.
//!
//! Every operation is idempotent with respect to the record identifier, so
//! any interleaving of a mutation's own result and its subscription echo
//! leaves the same contents.

use std::collections::HashSet;

use shared::domain::{Todo, TodoId};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Created(Todo),
    Updated(Todo),
    Deleted(TodoId),
}

impl SyncEvent {
    pub fn id(&self) -> &TodoId {
        match self {
            SyncEvent::Created(todo) | SyncEvent::Updated(todo) => &todo.id,
            SyncEvent::Deleted(id) => id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TodoStore {
    records: Vec<Todo>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with a list read. Soft-deleted records are
    /// dropped and the first occurrence of each id wins.
    pub fn seed(&mut self, records: impl IntoIterator<Item = Todo>) {
        let mut seen = HashSet::new();
        self.records = records
            .into_iter()
            .filter(|todo| !todo.is_soft_deleted())
            .filter(|todo| seen.insert(todo.id.clone()))
            .collect();
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn on_remote_create(&mut self, record: Todo) {
        if self.position(&record.id).is_some() {
            debug!(id = %record.id, "create echo for known record ignored");
            return;
        }
        self.records.push(record);
    }

    pub fn on_remote_update(&mut self, record: Todo) {
        match self.position(&record.id) {
            Some(index) => self.records[index] = record,
            None => debug!(id = %record.id, "update for unknown record ignored"),
        }
    }

    pub fn on_remote_delete(&mut self, id: &TodoId) {
        match self.position(id) {
            Some(index) => {
                self.records.remove(index);
            }
            None => debug!(%id, "delete for unknown record ignored"),
        }
    }

    pub fn apply(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Created(todo) => self.on_remote_create(todo),
            SyncEvent::Updated(todo) => self.on_remote_update(todo),
            SyncEvent::Deleted(id) => self.on_remote_delete(&id),
        }
    }

    pub fn records(&self) -> &[Todo] {
        &self.records
    }

    pub fn get(&self, id: &TodoId) -> Option<&Todo> {
        self.records.iter().find(|todo| &todo.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, id: &TodoId) -> Option<usize> {
        self.records.iter().position(|todo| &todo.id == id)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
