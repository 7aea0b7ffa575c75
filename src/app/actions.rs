use anyhow::Result;

use crate::storage::{Note, StorageHandle};

pub struct ActionDispatcher<'a> {
    storage: &'a StorageHandle,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(storage: &'a StorageHandle) -> Self {
        Self { storage }
    }

    /// Insert-or-update; on insert the generated id lands on `note`.
    pub fn save_note(&self, note: &mut Note) -> Result<()> {
        self.storage.upsert(note)
    }

    pub fn delete_note(&self, note_id: i64) -> Result<usize> {
        self.storage.delete_by_id(note_id)
    }
}
