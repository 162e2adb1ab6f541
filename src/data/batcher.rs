// ============================================================
// Layer 4 — NLI Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<NliItem>
// into tensors.
//
// Sentences have different lengths, so each side of the pair
// is padded with _PAD_ (id 0) up to the longest sentence in
// the batch:
//
//   premises        [batch, max_premise_len]      Int
//   premise_mask    [batch, max_premise_len]      1.0 real / 0.0 pad
//   hypotheses      [batch, max_hypothesis_len]   Int
//   hypothesis_mask [batch, max_hypothesis_len]
//   labels          [batch]                       Int
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::NliItem;
use crate::domain::vocabulary::PAD_ID;

#[derive(Debug, Clone)]
pub struct NliBatch<B: Backend> {
    pub premises:        Tensor<B, 2, Int>,
    pub premise_mask:    Tensor<B, 2>,
    pub hypotheses:      Tensor<B, 2, Int>,
    pub hypothesis_mask: Tensor<B, 2>,
    pub labels:          Tensor<B, 1, Int>,
}

/// Holds the target device so tensors are created on the
/// correct GPU/CPU.
#[derive(Clone, Debug)]
pub struct NliBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> NliBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Pad sequences to a common length and build the matching mask.
    fn pad(&self, sequences: &[&[usize]]) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
        let batch_size = sequences.len();
        // Sequences carry BOS/EOS so they are never empty; max(1) guards anyway
        let max_len = sequences.iter().map(|s| s.len()).max().unwrap_or(0).max(1);

        let mut ids  = Vec::with_capacity(batch_size * max_len);
        let mut mask = Vec::with_capacity(batch_size * max_len);
        for seq in sequences {
            ids.extend(seq.iter().map(|&id| id as i32));
            ids.extend(std::iter::repeat(PAD_ID as i32).take(max_len - seq.len()));
            mask.extend(std::iter::repeat(1.0f32).take(seq.len()));
            mask.extend(std::iter::repeat(0.0f32).take(max_len - seq.len()));
        }

        let ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([batch_size, max_len]);
        let mask = Tensor::<B, 1>::from_floats(mask.as_slice(), &self.device)
            .reshape([batch_size, max_len]);
        (ids, mask)
    }
}

impl<B: Backend> Batcher<NliItem, NliBatch<B>> for NliBatcher<B> {
    fn batch(&self, items: Vec<NliItem>) -> NliBatch<B> {
        let premises: Vec<&[usize]>   = items.iter().map(|i| i.premise.as_slice()).collect();
        let hypotheses: Vec<&[usize]> = items.iter().map(|i| i.hypothesis.as_slice()).collect();
        let labels: Vec<i32>          = items.iter().map(|i| i.label as i32).collect();

        let (premises, premise_mask)      = self.pad(&premises);
        let (hypotheses, hypothesis_mask) = self.pad(&hypotheses);
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        NliBatch { premises, premise_mask, hypotheses, hypothesis_mask, labels }
    }
}
