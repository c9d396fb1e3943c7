use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One vocabulary row as it appears in a model snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub counts: BTreeMap<String, u64>,
    pub sequence: u64,
}

/// A token pushed out to make room, with the counts it held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedToken {
    pub token: String,
    pub counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    counts: BTreeMap<String, u64>,
    total: u64,
    sequence: u64,
}

/// Token counts per category, never holding more than `limit` tokens.
///
/// When full, admitting a new token evicts the entry with the lowest combined
/// count, oldest insertion first on ties. `by_weight` mirrors `entries` ordered
/// by `(total, sequence)` so the victim is always the first element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    limit: usize,
    entries: HashMap<String, Entry>,
    by_weight: BTreeSet<(u64, u64, String)>,
    next_sequence: u64,
}

impl Vocabulary {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: HashMap::new(),
            by_weight: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn count(&self, token: &str, category: &str) -> u64 {
        self.entries
            .get(token)
            .and_then(|entry| entry.counts.get(category))
            .copied()
            .unwrap_or(0)
    }

    /// Make sure `token` has a row, evicting the weakest row if the vocabulary is full.
    pub fn admit(&mut self, token: &str) -> Option<EvictedToken> {
        if self.entries.contains_key(token) {
            return None;
        }

        let evicted = if self.entries.len() >= self.limit {
            self.evict_weakest()
        } else {
            None
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            token.to_string(),
            Entry {
                counts: BTreeMap::new(),
                total: 0,
                sequence,
            },
        );
        self.by_weight.insert((0, sequence, token.to_string()));

        evicted
    }

    /// Count one occurrence of an admitted token under `category`.
    pub fn increment(&mut self, token: &str, category: &str) {
        if let Some(entry) = self.entries.get_mut(token) {
            self.by_weight
                .remove(&(entry.total, entry.sequence, token.to_string()));
            entry.total += 1;
            *entry.counts.entry(category.to_string()).or_insert(0) += 1;
            self.by_weight
                .insert((entry.total, entry.sequence, token.to_string()));
        }
    }

    /// Lower the bound, returning every row evicted to honour it.
    pub fn set_limit(&mut self, limit: usize) -> Vec<EvictedToken> {
        self.limit = limit.max(1);
        let mut evicted = Vec::new();
        while self.entries.len() > self.limit {
            match self.evict_weakest() {
                Some(token) => evicted.push(token),
                None => break,
            }
        }
        evicted
    }

    fn evict_weakest(&mut self) -> Option<EvictedToken> {
        let (_, _, token) = self.by_weight.pop_first()?;
        let entry = self.entries.remove(&token)?;
        Some(EvictedToken {
            token,
            counts: entry.counts,
        })
    }

    /// Rows sorted by token.
    pub fn to_entries(&self) -> Vec<TokenEntry> {
        let mut entries: Vec<TokenEntry> = self
            .entries
            .iter()
            .map(|(token, entry)| TokenEntry {
                token: token.clone(),
                counts: entry.counts.clone(),
                sequence: entry.sequence,
            })
            .collect();
        entries.sort_by(|a, b| a.token.cmp(&b.token));
        entries
    }

    pub fn from_entries(limit: usize, entries: Vec<TokenEntry>, next_sequence: u64) -> Self {
        let mut vocabulary = Self::new(limit);
        let mut highest = None;

        for entry in entries {
            let total = entry.counts.values().sum();
            highest = highest.max(Some(entry.sequence));
            vocabulary
                .by_weight
                .insert((total, entry.sequence, entry.token.clone()));
            vocabulary.entries.insert(
                entry.token,
                Entry {
                    counts: entry.counts,
                    total,
                    sequence: entry.sequence,
                },
            );
        }

        vocabulary.next_sequence = highest.map_or(next_sequence, |h| next_sequence.max(h + 1));
        vocabulary
    }
}
