// TF-IDF over word-bounded character n-grams.
//
// Each whitespace token is padded with a single space on both sides and cut
// into n-grams of length 1..=3 that never cross a word boundary. Character
// n-grams tolerate inflection and letter-swap tricks ("пoдарок" with a Latin
// "o") far better than whole-word features.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::traits::ClassifierError;

pub const NGRAM_MIN: usize = 1;
pub const NGRAM_MAX: usize = 3;
/// A term must appear in at least this many documents to be kept.
pub const MIN_DF: usize = 2;
/// Terms appearing in more than this share of documents are dropped.
pub const MAX_DF: f64 = 0.9;
pub const MAX_FEATURES: usize = 5000;

/// Sparse row: (feature index, weight), sorted by index.
pub type SparseVec = Vec<(usize, f64)>;

/// Word-bounded character n-grams of a single document.
pub fn char_wb_ngrams(text: &str) -> Vec<String> {
    let mut grams = Vec::new();
    for word in text.split_whitespace() {
        let padded: Vec<char> = std::iter::once(' ')
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        let len = padded.len();

        for n in NGRAM_MIN..=NGRAM_MAX {
            let mut offset = 0;
            grams.push(padded[offset..(offset + n).min(len)].iter().collect());
            while offset + n < len {
                offset += 1;
                grams.push(padded[offset..offset + n].iter().collect());
            }
            // A word shorter than n yields its single (short) gram once
            if offset == 0 {
                break;
            }
        }
    }
    grams
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for gram in char_wb_ngrams(text) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and idf weights from preprocessed documents.
    pub fn fit(docs: &[String]) -> Result<Self, ClassifierError> {
        let n_docs = docs.len();
        let counts: Vec<HashMap<String, u32>> = docs.iter().map(|d| term_counts(d)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut tf: HashMap<&str, u64> = HashMap::new();
        for doc in &counts {
            for (term, &c) in doc {
                *df.entry(term.as_str()).or_insert(0) += 1;
                *tf.entry(term.as_str()).or_insert(0) += c as u64;
            }
        }

        let max_doc_count = MAX_DF * n_docs as f64;
        let mut kept: Vec<(&str, u64)> = df
            .iter()
            .filter(|(_, d)| **d >= MIN_DF && **d as f64 <= max_doc_count)
            .map(|(term, _)| (*term, tf.get(term).copied().unwrap_or(0)))
            .collect();

        if kept.is_empty() {
            return Err(ClassifierError::EmptyVocabulary);
        }

        // Most frequent first; lexical order breaks ties
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        kept.truncate(MAX_FEATURES);

        let mut terms: Vec<&str> = kept.into_iter().map(|(t, _)| t).collect();
        terms.sort_unstable();

        let n = n_docs as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let d = df.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + d)).ln() + 1.0
            })
            .collect();
        let vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        Ok(Self { vocabulary, idf })
    }

    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// TF-IDF row for one preprocessed document, L2-normalized.
    /// Unknown n-grams are ignored; a document with none yields an empty row.
    pub fn transform(&self, doc: &str) -> SparseVec {
        let mut row: SparseVec = term_counts(doc)
            .into_iter()
            .filter_map(|(term, c)| {
                self.vocabulary
                    .get(&term)
                    .map(|&i| (i, c as f64 * self.idf[i]))
            })
            .collect();
        row.sort_unstable_by_key(|(i, _)| *i);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }

    pub fn transform_all(&self, docs: &[String]) -> Vec<SparseVec> {
        docs.iter().map(|d| self.transform(d)).collect()
    }

    /// Internal consistency check for a deserialized vectorizer.
    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        let n = self.idf.len();
        if self.vocabulary.len() != n || self.vocabulary.values().any(|&i| i >= n) {
            return Err(ClassifierError::Corrupt(
                "vocabulary and idf table disagree".to_string(),
            ));
        }
        Ok(())
    }
}
