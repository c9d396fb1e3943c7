pub mod vocabulary;

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use vocabulary::{EvictedToken, TokenEntry, Vocabulary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub document_count: u64,
    pub token_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProbability {
    pub category: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub probabilities: Option<Vec<CategoryProbability>>,
}

impl Classification {
    pub fn probability_of(&self, category: &str) -> Option<f64> {
        self.probabilities
            .as_ref()?
            .iter()
            .find(|p| p.category == category)
            .map(|p| p.probability)
    }
}

fn default_category() -> String {
    "ham".to_string()
}

/// Serialized form of a trained model. Rows and categories are sorted, so two
/// equal models always serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSnapshot {
    pub vocabulary: Vec<TokenEntry>,
    pub categories: BTreeMap<String, CategoryStats>,
    pub total_documents: u64,
    pub vocabulary_size: usize,
    pub vocabulary_limit: usize,
    pub next_sequence: u64,
    #[serde(default = "default_category")]
    pub default_category: String,
}

/// Multinomial Naive Bayes over a bounded vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    vocabulary: Vocabulary,
    categories: BTreeMap<String, CategoryStats>,
    total_documents: u64,
    default_category: String,
}

impl Classifier {
    pub fn new(vocabulary_limit: usize, default_category: &str) -> Self {
        Self {
            vocabulary: Vocabulary::new(vocabulary_limit),
            categories: BTreeMap::new(),
            total_documents: 0,
            default_category: default_category.to_string(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.total_documents > 0 && !self.categories.is_empty()
    }

    pub fn total_documents(&self) -> u64 {
        self.total_documents
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary_limit(&self) -> usize {
        self.vocabulary.limit()
    }

    pub fn category_stats(&self, category: &str) -> Option<CategoryStats> {
        self.categories.get(category).copied()
    }

    pub fn token_count(&self, token: &str, category: &str) -> u64 {
        self.vocabulary.count(token, category)
    }

    pub fn learn(&mut self, tokens: &[String], category: &str) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .document_count += 1;
        self.total_documents += 1;

        for token in tokens {
            if let Some(evicted) = self.vocabulary.admit(token) {
                self.forget(evicted);
            }
            self.vocabulary.increment(token, category);
            if let Some(stats) = self.categories.get_mut(category) {
                stats.token_count += 1;
            }
        }
    }

    fn forget(&mut self, evicted: EvictedToken) {
        log::debug!("Evicting token {} from vocabulary", evicted.token);
        for (category, count) in evicted.counts {
            if let Some(stats) = self.categories.get_mut(&category) {
                stats.token_count = stats.token_count.saturating_sub(count);
            }
        }
    }

    pub fn categorize(
        &self,
        tokens: &[String],
        return_probabilities: bool,
    ) -> Result<Classification, ScanError> {
        if !self.is_loaded() {
            return Err(ScanError::NotLoaded);
        }

        let vocabulary_size = self.vocabulary.len() as f64;
        let total_documents = self.total_documents as f64;

        let scores: Vec<(&String, f64)> = self
            .categories
            .iter()
            .map(|(category, stats)| {
                let mut log_likelihood = (stats.document_count as f64 / total_documents).ln();
                let denominator = (stats.token_count as f64 + vocabulary_size).max(1.0);
                for token in tokens {
                    let count = self.vocabulary.count(token, category) as f64;
                    log_likelihood += ((count + 1.0) / denominator).ln();
                }
                (category, log_likelihood)
            })
            .collect();

        let best = scores
            .iter()
            .map(|(_, score)| *score)
            .fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<&String> = scores
            .iter()
            .filter(|(_, score)| *score == best)
            .map(|(category, _)| *category)
            .collect();

        // BTreeMap iteration makes the fallback the lexicographically first tie.
        let category = if tied.iter().any(|c| **c == self.default_category) {
            self.default_category.clone()
        } else {
            tied.first()
                .map(|c| (*c).clone())
                .unwrap_or_else(|| self.default_category.clone())
        };

        let probabilities = return_probabilities.then(|| softmax(&scores, best));

        Ok(Classification {
            category,
            probabilities,
        })
    }

    pub fn to_snapshot(&self) -> ClassifierSnapshot {
        ClassifierSnapshot {
            vocabulary: self.vocabulary.to_entries(),
            categories: self.categories.clone(),
            total_documents: self.total_documents,
            vocabulary_size: self.vocabulary.len(),
            vocabulary_limit: self.vocabulary.limit(),
            next_sequence: self.vocabulary.next_sequence(),
            default_category: self.default_category.clone(),
        }
    }

    pub fn from_snapshot(snapshot: ClassifierSnapshot) -> Self {
        if snapshot.vocabulary_size != snapshot.vocabulary.len() {
            log::warn!(
                "Snapshot declares {} tokens but holds {}",
                snapshot.vocabulary_size,
                snapshot.vocabulary.len()
            );
        }

        let mut classifier = Self {
            vocabulary: Vocabulary::from_entries(
                snapshot.vocabulary_limit,
                snapshot.vocabulary,
                snapshot.next_sequence,
            ),
            categories: snapshot.categories,
            total_documents: snapshot.total_documents,
            default_category: snapshot.default_category,
        };

        if classifier.vocabulary.len() > classifier.vocabulary.limit() {
            let limit = classifier.vocabulary.limit();
            classifier.set_vocabulary_limit(limit);
        }

        classifier
    }

    /// Change the bound, evicting and un-counting rows if the vocabulary shrinks.
    pub fn set_vocabulary_limit(&mut self, limit: usize) {
        for evicted in self.vocabulary.set_limit(limit) {
            self.forget(evicted);
        }
    }

    pub fn to_json(&self) -> Result<String, ScanError> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        let snapshot: ClassifierSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ScanError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a saved model, optionally re-bounding it to `vocabulary_limit`.
    pub fn load<P: AsRef<Path>>(path: P, vocabulary_limit: Option<usize>) -> Result<Self, ScanError> {
        let json = std::fs::read_to_string(path)?;
        let mut classifier = Self::from_json(&json)?;
        if let Some(limit) = vocabulary_limit {
            classifier.set_vocabulary_limit(limit);
        }
        Ok(classifier)
    }
}

fn softmax(scores: &[(&String, f64)], best: f64) -> Vec<CategoryProbability> {
    let weights: Vec<f64> = scores.iter().map(|(_, score)| (score - best).exp()).collect();
    let sum: f64 = weights.iter().sum();

    let mut probabilities: Vec<CategoryProbability> = scores
        .iter()
        .zip(weights)
        .map(|((category, _), weight)| CategoryProbability {
            category: (*category).clone(),
            probability: if sum > 0.0 { weight / sum } else { 0.0 },
        })
        .collect();

    probabilities.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    probabilities
}
