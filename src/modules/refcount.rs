use log::warn;
use std::collections::HashMap;

/// Active mount references per backing resource.
#[derive(Debug, Default)]
pub struct MountReferenceTracker {
    counts: HashMap<String, usize>,
}

impl MountReferenceTracker {
    /// Creates a tracker with no entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference and returns the new count.
    pub fn increment(&mut self, resource: &str) -> usize {
        let count = self.counts.entry(resource.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops a reference and returns the new count.
    ///
    /// The count never goes below zero.
    pub fn decrement(&mut self, resource: &str) -> usize {
        match self.counts.get_mut(resource) {
            Some(count) if *count > 0 => {
                *count -= 1;
                *count
            }
            _ => {
                warn!("Reference count for {} is already zero", resource);
                0
            }
        }
    }

    /// Current count, zero for unknown resources.
    pub fn count_of(&self, resource: &str) -> usize {
        self.counts.get(resource).copied().unwrap_or(0)
    }

    /// Tracker entry for `resource`, if one exists.
    pub fn entry(&self, resource: &str) -> Option<usize> {
        self.counts.get(resource).copied()
    }

    /// Sets the count of a freshly mounted resource.
    pub fn set(&mut self, resource: &str, count: usize) {
        self.counts.insert(resource.to_string(), count);
    }

    /// Removes the entry of a resource whose count is zero.
    ///
    /// Entries still referenced are kept.
    pub fn forget(&mut self, resource: &str) -> bool {
        if self.count_of(resource) == 0 {
            self.counts.remove(resource).is_some()
        } else {
            false
        }
    }
}
