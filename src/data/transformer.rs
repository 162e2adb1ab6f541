// ============================================================
// Layer 4 — Dataset Transformer
// ============================================================
// Encodes a whole RawCorpus split with the vocabulary.
//
// Label policy:
//   - training mode: the raw label must be a key of the label
//     map ("0" → 0, "1" → 1). Any other label drops the WHOLE
//     example (premise, hypothesis and label) silently.
//   - test mode: every example is kept and gets the
//     placeholder label 1 (true labels are unknown).

use std::collections::HashMap;

use crate::domain::{
    corpus::{EncodedDataset, EncodedExample, RawCorpus},
    vocabulary::Vocabulary,
};

/// Label id every test example carries.
pub const PLACEHOLDER_LABEL: usize = 1;

#[derive(Debug, Clone)]
pub struct LabelMap(HashMap<String, usize>);

impl LabelMap {
    pub fn get(&self, raw: &str) -> Option<usize> {
        self.0.get(raw).copied()
    }
}

impl Default for LabelMap {
    /// The binary map {"0": 0, "1": 1}
    fn default() -> Self {
        Self(HashMap::from([("0".to_string(), 0), ("1".to_string(), 1)]))
    }
}

pub struct DatasetTransformer<'a> {
    vocabulary: &'a Vocabulary,
    labels:     LabelMap,
}

impl<'a> DatasetTransformer<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary, labels: LabelMap::default() }
    }

    pub fn transform(&self, corpus: &RawCorpus, test: bool) -> EncodedDataset {
        let mut out = EncodedDataset::default();

        let rows = corpus
            .premises
            .iter()
            .zip(&corpus.hypotheses)
            .zip(&corpus.labels);

        for ((premise, hypothesis), raw_label) in rows {
            let label = if test {
                PLACEHOLDER_LABEL
            } else {
                match self.labels.get(raw_label) {
                    Some(label) => label,
                    None => continue,
                }
            };

            out.push(EncodedExample {
                premise:    self.vocabulary.encode(premise),
                hypothesis: self.vocabulary.encode(hypothesis),
                label,
            });
        }

        tracing::debug!(
            "Encoded {} of {} examples (test={})",
            out.len(),
            corpus.len(),
            test
        );
        out
    }
}
