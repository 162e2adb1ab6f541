// ============================================================
// Layer 3 — Corpus Domain Types
// ============================================================
// Two shapes of the same data:
//
//   RawCorpus       — tokenised text plus the raw label string
//                     exactly as read from the CSV
//   EncodedDataset  — the same examples as vocabulary ids,
//                     labels mapped to {0, 1}
//
// Both are "structure of arrays": three parallel Vecs that
// always have the same length.

use serde::{Deserialize, Serialize};

/// Tokenised sentence pairs with their raw label strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCorpus {
    pub premises:   Vec<Vec<String>>,
    pub hypotheses: Vec<Vec<String>>,
    pub labels:     Vec<String>,
}

impl RawCorpus {
    pub fn push(&mut self, premise: Vec<String>, hypothesis: Vec<String>, label: impl Into<String>) {
        self.premises.push(premise);
        self.hypotheses.push(hypothesis);
        self.labels.push(label.into());
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Premises followed by hypotheses — the vocabulary's input
    pub fn sentences(&self) -> impl Iterator<Item = &Vec<String>> {
        self.premises.iter().chain(self.hypotheses.iter())
    }
}

/// One encoded example: (premise ids, hypothesis ids, label id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedExample {
    pub premise:    Vec<usize>,
    pub hypothesis: Vec<usize>,
    pub label:      usize,
}

/// Parallel sequences of encoded premises, hypotheses and labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedDataset {
    pub premises:   Vec<Vec<usize>>,
    pub hypotheses: Vec<Vec<usize>>,
    pub labels:     Vec<usize>,
}

impl EncodedDataset {
    pub fn push(&mut self, example: EncodedExample) {
        self.premises.push(example.premise);
        self.hypotheses.push(example.hypothesis);
        self.labels.push(example.label);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<EncodedExample> {
        Some(EncodedExample {
            premise:    self.premises.get(index)?.clone(),
            hypothesis: self.hypotheses.get(index)?.clone(),
            label:      *self.labels.get(index)?,
        })
    }

    /// Copy the examples at `indices` (in that order) into a new dataset.
    /// Indices must be in range — they always come from a fold split of
    /// this same dataset.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            premises:   indices.iter().map(|&i| self.premises[i].clone()).collect(),
            hypotheses: indices.iter().map(|&i| self.hypotheses[i].clone()).collect(),
            labels:     indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn examples(&self) -> impl Iterator<Item = EncodedExample> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> EncodedDataset {
        let mut d = EncodedDataset::default();
        for i in 0..4 {
            d.push(EncodedExample {
                premise:    vec![2, 4 + i, 3],
                hypothesis: vec![2, 3],
                label:      i % 2,
            });
        }
        d
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let d = dataset().select(&[3, 0]);
        assert_eq!(d.len(), 2);
        assert_eq!(d.premises[0], vec![2, 7, 3]);
        assert_eq!(d.premises[1], vec![2, 4, 3]);
        assert_eq!(d.labels, vec![1, 0]);
    }

    #[test]
    fn test_get_out_of_range() {
        assert!(dataset().get(4).is_none());
    }

    #[test]
    fn test_raw_corpus_sentences_chain() {
        let mut c = RawCorpus::default();
        c.push(vec!["a".into()], vec!["b".into()], "0");
        let all: Vec<_> = c.sentences().collect();
        assert_eq!(all.len(), 2);
        assert_eq!(c.len(), 1);
    }
}
