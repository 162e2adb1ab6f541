// ============================================================
// Layer 4 — K-Fold Splitter
// ============================================================
// Partitions example indices into K disjoint folds. For fold f,
// partition f is the validation set and the union of all other
// partitions is the training set.
//
// Default layout is contiguous, the first (M mod K) folds one
// element larger:
//
//   M = 10, K = 3   →   [0 1 2 3] [4 5 6] [7 8 9]
//
// With a seed, indices are shuffled once (Fisher-Yates via
// rand::seq::SliceRandom on a seeded StdRng) before being cut,
// so the split is still reproducible.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::error::PipelineError;

/// Train / validation indices for one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub fold:  usize,
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct KFold {
    folds:   usize,
    shuffle: Option<u64>,
}

impl KFold {
    pub fn new(folds: usize) -> Self {
        Self { folds, shuffle: None }
    }

    /// Shuffle indices with the given seed before partitioning
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = Some(seed);
        self
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn split(&self, samples: usize) -> Result<Vec<FoldSplit>, PipelineError> {
        if self.folds < 2 || self.folds > samples {
            return Err(PipelineError::InvalidFoldCount { folds: self.folds, samples });
        }

        let mut indices: Vec<usize> = (0..samples).collect();
        if let Some(seed) = self.shuffle {
            indices.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        let fold_size = samples / self.folds;
        let remainder = samples % self.folds;

        let mut splits = Vec::with_capacity(self.folds);
        let mut start  = 0;
        for fold in 0..self.folds {
            let end = start + fold_size + usize::from(fold < remainder);

            let valid = indices[start..end].to_vec();
            let train = indices[..start]
                .iter()
                .chain(&indices[end..])
                .copied()
                .collect();

            splits.push(FoldSplit { fold, train, valid });
            start = end;
        }

        tracing::debug!("{} examples split into {} folds", samples, self.folds);
        Ok(splits)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_contiguous_layout() {
        let splits = KFold::new(3).split(10).unwrap();
        assert_eq!(splits[0].valid, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].valid, vec![4, 5, 6]);
        assert_eq!(splits[2].valid, vec![7, 8, 9]);
        assert_eq!(splits[1].train, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let a = KFold::new(4).with_shuffle(42).split(20).unwrap();
        let b = KFold::new(4).with_shuffle(42).split(20).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, KFold::new(4).split(20).unwrap());
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(KFold::new(1).split(10).is_err());
        assert!(KFold::new(11).split(10).is_err());
        assert!(KFold::new(2).split(0).is_err());
    }

    proptest! {
        #[test]
        fn prop_folds_partition_indices(samples in 2usize..200, k in 2usize..12, seed in proptest::option::of(any::<u64>())) {
            prop_assume!(k <= samples);
            let mut kfold = KFold::new(k);
            if let Some(seed) = seed {
                kfold = kfold.with_shuffle(seed);
            }
            let splits = kfold.split(samples).unwrap();
            prop_assert_eq!(splits.len(), k);

            let mut seen = HashSet::new();
            for split in &splits {
                // pairwise disjoint validation partitions
                for &i in &split.valid {
                    prop_assert!(seen.insert(i));
                }
                // train is exactly the complement of valid
                prop_assert_eq!(split.train.len() + split.valid.len(), samples);
                let valid: HashSet<_> = split.valid.iter().collect();
                prop_assert!(split.train.iter().all(|i| !valid.contains(i)));
            }
            // union is the full index set
            prop_assert_eq!(seen.len(), samples);
        }
    }
}
