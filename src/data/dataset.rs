use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::corpus::EncodedDataset;

/// One encoded sentence pair as seen by the DataLoader.
/// Sequences keep their natural length; the batcher pads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliItem {
    pub premise:    Vec<usize>,
    pub hypothesis: Vec<usize>,
    pub label:      usize,
}

pub struct NliDataset {
    items: Vec<NliItem>,
}

impl NliDataset {
    pub fn new(items: Vec<NliItem>) -> Self { Self { items } }

    pub fn item_count(&self) -> usize { self.items.len() }
}

impl From<&EncodedDataset> for NliDataset {
    fn from(data: &EncodedDataset) -> Self {
        let items = data
            .examples()
            .map(|e| NliItem { premise: e.premise, hypothesis: e.hypothesis, label: e.label })
            .collect();
        Self::new(items)
    }
}

impl Dataset<NliItem> for NliDataset {
    fn get(&self, index: usize) -> Option<NliItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
