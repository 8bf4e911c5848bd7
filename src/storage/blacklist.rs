use bloomfilter::Bloom;
use std::collections::HashMap;

use crate::domain::NationalId;

const MIN_CAPACITY: usize = 100;
const FP_RATE: f64 = 0.01;

/// National-id blacklist.
///
/// A bloom filter gives a fast negative for the common clean case; the
/// map is the definitive check and carries the listing reason.
#[derive(Debug)]
pub struct Blacklist {
    bloom: Bloom<String>,
    capacity: usize,
    entries: HashMap<String, String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Blacklist::with_capacity(MIN_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Blacklist {
            bloom: Bloom::new_for_fp_rate(capacity, FP_RATE),
            capacity,
            entries: HashMap::new(),
        }
    }

    /// Add a national id with the reason it was listed.
    pub fn insert(&mut self, nid: &NationalId, reason: impl Into<String>) {
        let key = nid.as_str().to_string();
        self.entries.insert(key.clone(), reason.into());

        if self.entries.len() > self.capacity {
            self.rebuild(self.capacity * 2);
        } else {
            self.bloom.set(&key);
        }
    }

    #[inline]
    pub fn contains(&self, nid: &NationalId) -> bool {
        let key = nid.as_str().to_string();

        if !self.bloom.check(&key) {
            return false;
        }

        self.entries.contains_key(&key)
    }

    pub fn reason(&self, nid: &NationalId) -> Option<&str> {
        self.entries.get(nid.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rebuild(&mut self, capacity: usize) {
        let mut bloom = Bloom::new_for_fp_rate(capacity, FP_RATE);
        for key in self.entries.keys() {
            bloom.set(key);
        }
        self.bloom = bloom;
        self.capacity = capacity;
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Blacklist::new()
    }
}
