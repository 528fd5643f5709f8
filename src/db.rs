//! In-memory record and container databases.
//!
//! Both are keyed maps iterated in ascending key order. Records get fresh keys
//! on insertion, so iteration follows insertion order and repeated passes over
//! an unmodified database visit entries in the same order.

use std::collections::BTreeMap;

use crate::record::{ContainerRecord, Record};

/// Read access to a collection of shared records.
pub trait RecordCollection {
    fn count(&self) -> usize;

    fn iter(&self) -> Box<dyn Iterator<Item = (u32, &Record)> + '_>;
}

/// Records of a share, or the local mirror of a remote share's records.
#[derive(Debug, Default)]
pub struct RecordDb {
    records: BTreeMap<u32, Record>,
    next_id: u32,
}

impl RecordDb {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Store a record under the next free key and return that key.
    pub fn add(&mut self, record: Record) -> u32 {
        let id = self.next_id.max(1);
        self.records.insert(id, record);
        self.next_id = id + 1;
        id
    }
}

impl RecordCollection for RecordDb {
    fn count(&self) -> usize {
        self.records.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (u32, &Record)> + '_> {
        Box::new(self.records.iter().map(|(k, v)| (*k, v)))
    }
}

/// Containers (playlists, albums) of a share.
#[derive(Debug, Default)]
pub struct ContainerDb {
    containers: BTreeMap<u32, ContainerRecord>,
}

impl ContainerDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, container: ContainerRecord) {
        self.containers.insert(container.id, container);
    }

    pub fn count(&self) -> usize {
        self.containers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerRecord> {
        self.containers.values()
    }
}
