// ============================================================
// Layer 4 — Embedding Matrix Builder
// ============================================================
// Aligns a pretrained word-vector file to vocabulary ids.
//
// File format: one entry per line, space separated
//   token v1 v2 ... vN
//
// A line counts as an embedding only if its SECOND field parses
// as a float. Lines from multi-word entries ("new york 0.1 ...")
// fail that check and are skipped. A single-character numeric
// token can still be misread by this rule; it is kept as is.
//
// Only tokens present in the vocabulary are held in memory, so
// the full vector file is never loaded.
//
// Matrix rows:
//   row 0 (_PAD_)     all zeros
//   pretrained token  exact values from the file
//   anything else     independent N(0, 1) sample per dimension

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    error::PipelineError,
    vocabulary::{Vocabulary, PAD_ID},
};

/// Dense (vocabulary size × dimension) matrix, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    rows:   usize,
    dim:    usize,
    values: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self { rows, dim, values: vec![0.0; rows * dim] }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[cfg(test)]
    pub fn row(&self, id: usize) -> &[f32] {
        &self.values[id * self.dim..(id + 1) * self.dim]
    }

    pub fn row_mut(&mut self, id: usize) -> &mut [f32] {
        &mut self.values[id * self.dim..(id + 1) * self.dim]
    }

    /// Flat row-major values, ready for a [rows, dim] tensor
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

pub struct EmbeddingBuilder<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> EmbeddingBuilder<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn build_from_file<R: Rng>(&self, path: impl AsRef<Path>, rng: &mut R) -> Result<EmbeddingMatrix> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open embeddings file '{}'", path.display()))?;
        self.build(BufReader::new(file), &path.display().to_string(), rng)
    }

    pub fn build<R: Rng>(&self, reader: impl BufRead, source: &str, rng: &mut R) -> Result<EmbeddingMatrix> {
        let (pretrained, dim) = self.read_vectors(reader, source)?;

        let mut matrix = EmbeddingMatrix::zeros(self.vocabulary.len(), dim);
        let mut sampled = 0usize;

        for (id, token) in self.vocabulary.iter() {
            if id == PAD_ID {
                continue;
            }
            match pretrained.get(token) {
                Some(vector) => matrix.row_mut(id).copy_from_slice(vector),
                None => {
                    for v in matrix.row_mut(id) {
                        *v = rng.sample(StandardNormal);
                    }
                    sampled += 1;
                }
            }
        }

        tracing::info!(
            "Embedding matrix {}x{}: {} pretrained rows, {} randomly initialised",
            matrix.rows(),
            dim,
            pretrained.len(),
            sampled
        );
        Ok(matrix)
    }

    /// Keep only vectors of vocabulary tokens. The dimension is taken
    /// from the first retained line.
    fn read_vectors(&self, reader: impl BufRead, source: &str) -> Result<(HashMap<String, Vec<f32>>, usize)> {
        let mut pretrained: HashMap<String, Vec<f32>> = HashMap::new();
        let mut dim: Option<usize> = None;
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line.with_context(|| format!("Cannot read '{source}'"))?;
            let mut fields = line.split_whitespace();

            let (Some(token), Some(first)) = (fields.next(), fields.next()) else {
                skipped += 1;
                continue;
            };
            if first.parse::<f64>().is_err() {
                skipped += 1;
                continue;
            }
            if !self.vocabulary.contains(token) {
                continue;
            }

            let vector = std::iter::once(first)
                .chain(fields)
                .map(|v| {
                    v.parse::<f32>().map_err(|_| PipelineError::MalformedEmbeddingRow {
                        token: token.to_string(),
                        value: v.to_string(),
                    })
                })
                .collect::<Result<Vec<f32>, _>>()?;

            let expected = *dim.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(PipelineError::EmbeddingDimMismatch {
                    token: token.to_string(),
                    expected,
                    found: vector.len(),
                }
                .into());
            }
            pretrained.insert(token.to_string(), vector);
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} malformed or multi-word lines in '{}'", skipped, source);
        }

        let dim = dim.ok_or_else(|| PipelineError::NoPretrainedVectors { path: source.to_string() })?;
        Ok((pretrained, dim))
    }
}
