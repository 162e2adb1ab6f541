// ============================================================
// Layer 5 — ESIM Model Architecture
// ============================================================
// Enhanced Sequential Inference Model (Chen et al., 2017).
//
//   premise ids ──┐                         ┌── hypothesis ids
//                 ▼                         ▼
//        embedding (pretrained matrix, dropout)
//                 │                         │
//        BiLSTM encoder × mask      BiLSTM encoder × mask
//                 │                         │
//                 └──── soft alignment ─────┘
//                 │   e = a · bᵀ, masked softmax both ways
//                 ▼                         ▼
//        enhance [a; ã; a - ã; a ⊙ ã]  (same for b)
//                 │                         │
//        Linear + ReLU projection → BiLSTM composition
//                 │                         │
//        masked avg + max pooling   masked avg + max pooling
//                 └──────────┬──────────────┘
//                            ▼
//     dropout → Linear(8h→h) → tanh → dropout → Linear(h→C)
//                            │
//                logits [batch, C] + softmax
//
// Padding never leaks into real positions: the backward LSTM
// reads each sequence reversed within its own length, and
// every later stage masks padded steps out.
//
// Reference: Burn Book §3 (Building Blocks)
//            Chen et al. (2017) Enhanced LSTM for Natural Language Inference

use anyhow::{ensure, Result};
use burn::{
    module::Param,
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig,
    },
    prelude::*,
    tensor::activation,
};

use crate::data::embeddings::EmbeddingMatrix;

/// Subtracted from masked entries before softmax or max
const MASK_PENALTY: f64 = 1e7;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct EsimConfig {
    pub vocab_size:    usize,
    pub embedding_dim: usize,
    pub hidden_size:   usize,
    #[config(default = 2)]
    pub num_classes:   usize,
    #[config(default = 0.5)]
    pub dropout:       f64,
}

impl EsimConfig {
    /// Randomly initialised embeddings; used when no matrix is at hand
    /// (tests, and inference before the checkpoint overwrites weights).
    pub fn init<B: Backend>(&self, device: &B::Device) -> EsimModel<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device);
        self.build(embedding, device)
    }

    /// Embedding layer initialised from the pretrained matrix.
    pub fn init_with_embeddings<B: Backend>(
        &self,
        matrix: &EmbeddingMatrix,
        device: &B::Device,
    ) -> Result<EsimModel<B>> {
        ensure!(
            matrix.rows() == self.vocab_size && matrix.dim() == self.embedding_dim,
            "embedding matrix is {}×{}, model expects {}×{}",
            matrix.rows(), matrix.dim(), self.vocab_size, self.embedding_dim,
        );

        let weight = Tensor::<B, 1>::from_floats(matrix.values(), device)
            .reshape([matrix.rows(), matrix.dim()]);
        let mut embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device);
        embedding.weight = Param::from_tensor(weight);

        Ok(self.build(embedding, device))
    }

    fn build<B: Backend>(&self, embedding: Embedding<B>, device: &B::Device) -> EsimModel<B> {
        let h = self.hidden_size;
        EsimModel {
            embedding,
            encoder:     MaskedBiLstm::new(self.embedding_dim, h, device),
            projection:  LinearConfig::new(8 * h, h).init(device),
            composition: MaskedBiLstm::new(h, h, device),
            hidden:      LinearConfig::new(8 * h, h).init(device),
            output:      LinearConfig::new(h, self.num_classes).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }
}

// ─── Masked bidirectional LSTM ────────────────────────────────────────────────
/// Two LSTMs. The backward one runs over each sequence reversed
/// inside its real length, so trailing padding is read last in
/// both directions.
#[derive(Module, Debug)]
pub struct MaskedBiLstm<B: Backend> {
    pub forward_lstm:  Lstm<B>,
    pub backward_lstm: Lstm<B>,
}

impl<B: Backend> MaskedBiLstm<B> {
    fn new(d_input: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            forward_lstm:  LstmConfig::new(d_input, d_hidden, true).init(device),
            backward_lstm: LstmConfig::new(d_input, d_hidden, true).init(device),
        }
    }

    /// x: [batch, seq, d_input], mask: [batch, seq] → [batch, seq, 2·d_hidden]
    pub fn run(&self, x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let (fwd, _) = self.forward_lstm.forward(x.clone(), None);

        let index = reverse_within_length(mask);
        let reversed = gather_steps(x, index.clone());
        let (bwd, _) = self.backward_lstm.forward(reversed, None);
        // Reversal is an involution, so the same index restores order
        let bwd = gather_steps(bwd, index);

        Tensor::cat(vec![fwd, bwd], 2)
    }
}

/// Index mapping position t to (len - 1 - t) for real positions
/// and leaving padded positions in place. [batch, seq]
fn reverse_within_length<B: Backend>(mask: Tensor<B, 2>) -> Tensor<B, 2, Int> {
    let [batch, seq] = mask.dims();
    let device = mask.device();

    let lengths = mask.sum_dim(1).int().expand([batch, seq]);
    let positions = Tensor::<B, 1, Int>::arange(0..seq as i64, &device)
        .reshape([1, seq])
        .expand([batch, seq]);

    let reversed = lengths.clone() - positions.clone() - 1;
    let valid = positions.clone().lower(lengths);
    positions.mask_where(valid, reversed)
}

/// Reorder the time steps of x: out[b, t, :] = x[b, index[b, t], :]
fn gather_steps<B: Backend>(x: Tensor<B, 3>, index: Tensor<B, 2, Int>) -> Tensor<B, 3> {
    let [batch, seq, width] = x.dims();
    x.gather(1, index.unsqueeze_dim::<3>(2).expand([batch, seq, width]))
}

// ─── ESIM ─────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EsimModel<B: Backend> {
    pub embedding:   Embedding<B>,
    pub encoder:     MaskedBiLstm<B>,
    pub projection:  Linear<B>,
    pub composition: MaskedBiLstm<B>,
    pub hidden:      Linear<B>,
    pub output:      Linear<B>,
    pub dropout:     Dropout,
}

pub struct EsimOutput<B: Backend> {
    /// [batch, num_classes]
    pub logits:        Tensor<B, 2>,
    /// softmax(logits) along the class dimension
    pub probabilities: Tensor<B, 2>,
}

impl<B: Backend> EsimModel<B> {
    pub fn forward(
        &self,
        premises:        Tensor<B, 2, Int>,
        premise_mask:    Tensor<B, 2>,
        hypotheses:      Tensor<B, 2, Int>,
        hypothesis_mask: Tensor<B, 2>,
    ) -> EsimOutput<B> {
        // ── Input encoding ────────────────────────────────────────────────────
        let a = self.encode(premises, premise_mask.clone());
        let b = self.encode(hypotheses, hypothesis_mask.clone());

        // ── Local inference: soft alignment ───────────────────────────────────
        let similarity = a.clone().matmul(b.clone().swap_dims(1, 2)); // [batch, la, lb]
        let a_attn = masked_softmax(similarity.clone(), hypothesis_mask.clone());
        let b_attn = masked_softmax(similarity.swap_dims(1, 2), premise_mask.clone());

        let a_aligned = apply_mask(a_attn.matmul(b.clone()), premise_mask.clone());
        let b_aligned = apply_mask(b_attn.matmul(a.clone()), hypothesis_mask.clone());

        // ── Enhancement + projection ──────────────────────────────────────────
        let m_a = self.project(enhance(a, a_aligned));
        let m_b = self.project(enhance(b, b_aligned));

        // ── Composition + pooling ─────────────────────────────────────────────
        let v_a = self.composition.run(m_a, premise_mask.clone());
        let v_b = self.composition.run(m_b, hypothesis_mask.clone());

        let v = Tensor::cat(
            vec![
                masked_mean(v_a.clone(), premise_mask.clone()),
                masked_max(v_a, premise_mask),
                masked_mean(v_b.clone(), hypothesis_mask.clone()),
                masked_max(v_b, hypothesis_mask),
            ],
            1,
        ); // [batch, 8h]

        // ── Classifier ────────────────────────────────────────────────────────
        let x = self.hidden.forward(self.dropout.forward(v)).tanh();
        let logits = self.output.forward(self.dropout.forward(x));
        let probabilities = activation::softmax(logits.clone(), 1);

        EsimOutput { logits, probabilities }
    }

    /// Mean cross-entropy over the batch.
    pub fn forward_loss(
        &self,
        premises:        Tensor<B, 2, Int>,
        premise_mask:    Tensor<B, 2>,
        hypotheses:      Tensor<B, 2, Int>,
        hypothesis_mask: Tensor<B, 2>,
        labels:          Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, EsimOutput<B>) {
        let output = self.forward(premises, premise_mask, hypotheses, hypothesis_mask);
        let ce = CrossEntropyLossConfig::new().init(&output.logits.device());
        let loss = ce.forward(output.logits.clone(), labels);
        (loss, output)
    }

    fn encode(&self, ids: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let embedded = self.dropout.forward(self.embedding.forward(ids));
        apply_mask(self.encoder.run(embedded, mask.clone()), mask)
    }

    fn project(&self, enhanced: Tensor<B, 3>) -> Tensor<B, 3> {
        self.dropout.forward(activation::relu(self.projection.forward(enhanced)))
    }
}

// ─── Tensor helpers ───────────────────────────────────────────────────────────

/// [batch, seq] mask → [batch, seq, width]
fn expand_mask<B: Backend>(mask: Tensor<B, 2>, width: usize) -> Tensor<B, 3> {
    let [batch, seq] = mask.dims();
    mask.unsqueeze_dim::<3>(2).expand([batch, seq, width])
}

fn apply_mask<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let width = x.dims()[2];
    x * expand_mask(mask, width)
}

/// Softmax over the last dimension ignoring masked key positions.
/// scores: [batch, lq, lk], key_mask: [batch, lk]
fn masked_softmax<B: Backend>(scores: Tensor<B, 3>, key_mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, lq, lk] = scores.dims();
    // 0 for real keys, -MASK_PENALTY for padding
    let penalty = (key_mask.unsqueeze_dim::<3>(1) - 1.0) * MASK_PENALTY;
    activation::softmax(scores + penalty.expand([batch, lq, lk]), 2)
}

/// [a; ã; a - ã; a ⊙ ã] along the feature dimension
fn enhance<B: Backend>(a: Tensor<B, 3>, aligned: Tensor<B, 3>) -> Tensor<B, 3> {
    Tensor::cat(
        vec![
            a.clone(),
            aligned.clone(),
            a.clone() - aligned.clone(),
            a * aligned,
        ],
        2,
    )
}

/// Mean over real steps: [batch, seq, d] → [batch, d]
fn masked_mean<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch, _, d] = x.dims();
    let mask = expand_mask(mask, d);
    let sum = (x * mask.clone()).sum_dim(1);
    (sum / mask.sum_dim(1)).reshape([batch, d])
}

/// Max over real steps: [batch, seq, d] → [batch, d]
fn masked_max<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch, _, d] = x.dims();
    let mask = expand_mask(mask, d);
    let filled = x * mask.clone() + (mask - 1.0) * MASK_PENALTY;
    // ndarray's max_dim backward scatters on the last dim only
    filled.swap_dims(1, 2).max_dim(2).reshape([batch, d])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> EsimConfig {
        EsimConfig::new(12, 6, 4).with_dropout(0.0)
    }

    fn ids(rows: &[&[i32]]) -> Tensor<TestBackend, 2, Int> {
        let width = rows[0].len();
        let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), width])
    }

    fn mask(rows: &[&[f32]]) -> Tensor<TestBackend, 2> {
        let width = rows[0].len();
        let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &Default::default())
            .reshape([rows.len(), width])
    }

    #[test]
    fn test_output_shape_and_probabilities() {
        let model: EsimModel<TestBackend> = config().init(&Default::default());
        let out = model.forward(
            ids(&[&[2, 5, 3, 0], &[2, 6, 7, 3]]),
            mask(&[&[1.0, 1.0, 1.0, 0.0], &[1.0, 1.0, 1.0, 1.0]]),
            ids(&[&[2, 8, 3], &[2, 3, 0]]),
            mask(&[&[1.0, 1.0, 1.0], &[1.0, 1.0, 0.0]]),
        );

        assert_eq!(out.logits.dims(), [2, 2]);
        let probs: Vec<f32> = out.probabilities.into_data().iter::<f32>().collect();
        assert!((probs[0] + probs[1] - 1.0).abs() < 1e-5);
        assert!((probs[2] + probs[3] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_padding_does_not_change_prediction() {
        let model: EsimModel<TestBackend> = config().init(&Default::default());

        let short = model.forward(
            ids(&[&[2, 5, 9, 3]]),
            mask(&[&[1.0, 1.0, 1.0, 1.0]]),
            ids(&[&[2, 8, 3]]),
            mask(&[&[1.0, 1.0, 1.0]]),
        );
        let padded = model.forward(
            ids(&[&[2, 5, 9, 3, 0, 0]]),
            mask(&[&[1.0, 1.0, 1.0, 1.0, 0.0, 0.0]]),
            ids(&[&[2, 8, 3, 0]]),
            mask(&[&[1.0, 1.0, 1.0, 0.0]]),
        );

        let a: Vec<f32> = short.logits.into_data().iter::<f32>().collect();
        let b: Vec<f32> = padded.logits.into_data().iter::<f32>().collect();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_masked_max_skips_padding() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([1.0, -5.0, 3.0, -2.0, 9.0, 9.0], &device)
            .reshape([1, 3, 2]);
        let pooled: Vec<f32> = masked_max(x, mask(&[&[1.0, 1.0, 0.0]])).into_data().iter::<f32>().collect();
        assert_eq!(pooled, vec![3.0, -2.0]);
    }

    #[test]
    fn test_backward_step_on_padded_batch() {
        use crate::ml::trainer::adam;
        use burn::{backend::Autodiff, optim::{GradientsParams, Optimizer}};

        type TrainBackend = Autodiff<NdArray>;
        let device = Default::default();
        let ids = |rows: &[&[i32]]| {
            let width = rows[0].len();
            let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
            Tensor::<TrainBackend, 1, Int>::from_ints(flat.as_slice(), &device).reshape([rows.len(), width])
        };
        let mask = |rows: &[&[f32]]| {
            let width = rows[0].len();
            let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
            Tensor::<TrainBackend, 1>::from_floats(flat.as_slice(), &device).reshape([rows.len(), width])
        };

        let model: EsimModel<TrainBackend> = EsimConfig::new(12, 6, 4).init(&device);
        let before: Vec<f32> = model.output.weight.val().into_data().iter::<f32>().collect();

        let (loss, _) = model.forward_loss(
            ids(&[&[2, 5, 3, 0], &[2, 6, 7, 3]]),
            mask(&[&[1.0, 1.0, 1.0, 0.0], &[1.0, 1.0, 1.0, 1.0]]),
            ids(&[&[2, 8, 3], &[2, 3, 0]]),
            mask(&[&[1.0, 1.0, 1.0], &[1.0, 1.0, 0.0]]),
            Tensor::<TrainBackend, 1, Int>::from_ints([1, 0], &device),
        );
        assert!(loss.clone().into_scalar().is_finite());

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        let model = adam::<TrainBackend>(10.0).step(1e-2, model, grads);

        let after: Vec<f32> = model.output.weight.val().into_data().iter::<f32>().collect();
        assert_ne!(before, after);
    }

    #[test]
    fn test_reverse_index_keeps_padding_in_place() {
        let index = reverse_within_length(mask(&[&[1.0, 1.0, 1.0, 0.0]]));
        let index: Vec<i64> = index.into_data().iter::<i64>().collect();
        assert_eq!(index, vec![2, 1, 0, 3]);
    }

    #[test]
    fn test_pretrained_rows_are_loaded() {
        let mut matrix = EmbeddingMatrix::zeros(12, 6);
        matrix.row_mut(4).copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let model: EsimModel<TestBackend> =
            config().init_with_embeddings(&matrix, &Default::default()).unwrap();
        let weight: Vec<f32> = model.embedding.weight.val().into_data().iter::<f32>().collect();
        assert_eq!(&weight[24..30], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let wrong = EmbeddingMatrix::zeros(11, 6);
        assert!(config().init_with_embeddings::<TestBackend>(&wrong, &Default::default()).is_err());
    }
}
