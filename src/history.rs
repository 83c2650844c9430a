use crate::models::DetectionRecord;

/// Append-only detection history for one session.
///
/// There is no eviction: the store grows for as long as the session lives,
/// holding two full images per record.
#[derive(Debug, Default)]
pub struct HistoryStore {
    records: Vec<DetectionRecord>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` at the end and return the stored copy
    pub fn append(&mut self, record: DetectionRecord) -> &DetectionRecord {
        let index = self.records.len();
        self.records.push(record);
        &self.records[index]
    }

    /// All records, oldest first
    pub fn list(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&DetectionRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&DetectionRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
