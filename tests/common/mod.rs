//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use funnel_editor::{SnapshotStorage, StorageError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Storage that records every write.
#[derive(Default, Clone)]
pub struct RecordingStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
    /// (key, value) per successful write
    pub writes: Rc<RefCell<Vec<(String, String)>>>,
    /// Count of rejected writes
    pub failed_writes: Rc<RefCell<usize>>,
    /// When set, every write fails
    pub fail_writes: Rc<RefCell<bool>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        storage
    }

    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }

    pub fn last_write(&self) -> Option<String> {
        self.writes.borrow().last().map(|(_, value)| value.clone())
    }

    /// Clear recorded writes (the stored entries are kept).
    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
        *self.failed_writes.borrow_mut() = 0;
    }
}

impl SnapshotStorage for RecordingStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if *self.fail_writes.borrow() {
            *self.failed_writes.borrow_mut() += 1;
            return Err(StorageError::Unavailable);
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes
            .borrow_mut()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}
