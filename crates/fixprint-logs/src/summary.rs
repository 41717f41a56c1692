use std::collections::HashMap;

/// Per message type counts, reported in the order types were first seen
#[derive(Clone, Debug, Default)]
pub struct MessageSummary {
    /// Position of each tag in `entries`
    index: HashMap<String, usize>,

    entries: Vec<(String, u64)>,
}

impl MessageSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one message of the given type
    pub fn record(&mut self, tag: &str) {
        match self.index.get(tag) {
            Some(&pos) => self.entries[pos].1 += 1,
            None => {
                self.index.insert(tag.to_string(), self.entries.len());
                self.entries.push((tag.to_string(), 1));
            }
        }
    }

    pub fn count(&self, tag: &str) -> u64 {
        self.index.get(tag).map_or(0, |&pos| self.entries[pos].1)
    }

    /// (tag, count) pairs in first-seen order
    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(tag, count)| (tag.as_str(), *count))
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Number of distinct types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
