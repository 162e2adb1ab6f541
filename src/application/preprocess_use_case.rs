// ============================================================
// Layer 2 — PreprocessUseCase
// ============================================================
// Turns the raw CSV corpus into the four JSON artifacts the
// training and test stages consume:
//
//   Step 1: Read the question table            (Layer 4 - data)
//   Step 2: Load + tokenise train.csv          (Layer 4 - data)
//   Step 3: Build the vocabulary               (Layer 3 - domain)
//   Step 4: Encode the train split             (Layer 4 - data)
//   Step 5: Load + encode test.csv             (Layer 4 - data)
//   Step 6: Build the embedding matrix         (Layer 4 - data)
//
// Every artifact goes through ArtifactStore::load_or_build, so a
// rerun keeps whatever is already on disk.
//
// Reference: Rust Book §13 (Iterators and Closures)

use std::path::PathBuf;

use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    embeddings::{EmbeddingBuilder, EmbeddingMatrix},
    loader::{PairLoader, QuestionTable, TokenLevel},
    preprocessor::Preprocessor,
    transformer::DatasetTransformer,
};
use crate::domain::{
    corpus::{EncodedDataset, RawCorpus},
    vocabulary::Vocabulary,
};
use crate::infra::artifact_store::{ArtifactStore, EMBEDDINGS, TEST_DATA, TRAIN_DATA, VOCABULARY};

const TRAIN_FILE: &str = "train.csv";
const TEST_FILE: &str = "test.csv";

// ─── Preprocessing Configuration ─────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Directory holding train.csv, test.csv and the question file
    pub data_dir:           PathBuf,
    /// Relative to data_dir
    pub question_file:      String,
    pub embeddings_file:    PathBuf,
    pub target_dir:         PathBuf,
    pub lowercase:          bool,
    pub ignore_punctuation: bool,
    /// Keep only the most frequent words (all when unset)
    pub num_words:          Option<usize>,
    pub token_level:        TokenLevel,
    /// Seeds the normal initialisation of uncovered embedding rows
    pub seed:               u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            data_dir:           PathBuf::from("data"),
            question_file:      "question.csv".to_string(),
            embeddings_file:    PathBuf::from("data/embeddings.txt"),
            target_dir:         PathBuf::from("data/preprocessed"),
            lowercase:          false,
            ignore_punctuation: false,
            num_words:          None,
            token_level:        TokenLevel::Char,
            seed:               42,
        }
    }
}

// ─── PreprocessUseCase ───────────────────────────────────────────────────────
pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        let store = ArtifactStore::new(&cfg.target_dir)?;

        // ── Step 1: Question table ────────────────────────────────────────────
        let questions = QuestionTable::from_file(cfg.data_dir.join(&cfg.question_file))?;
        if questions.is_empty() {
            tracing::warn!("Question table '{}' has no rows", cfg.question_file);
        } else {
            tracing::info!("Loaded {} questions", questions.len());
        }

        let preprocessor = Preprocessor::new(cfg.lowercase, cfg.ignore_punctuation);
        let loader = PairLoader::new(&questions, preprocessor, cfg.token_level);
        let load_split = |file: &str| loader.load(cfg.data_dir.join(file));

        // ── Steps 2–4: Train split and vocabulary ─────────────────────────────
        let mut train_corpus: Option<RawCorpus> = None;
        let mut train_split = || -> Result<RawCorpus> {
            if let Some(corpus) = &train_corpus {
                return Ok(corpus.clone());
            }
            let corpus = load_split(TRAIN_FILE)?;
            if corpus.is_empty() {
                tracing::warn!("{} has no sentence pairs", TRAIN_FILE);
            }
            train_corpus = Some(corpus.clone());
            Ok(corpus)
        };

        let vocabulary: Vocabulary = store.load_or_build(VOCABULARY, || {
            let corpus = train_split()?;
            Ok(Vocabulary::build(corpus.sentences(), cfg.num_words))
        })?;
        tracing::info!("Vocabulary size: {}", vocabulary.len());

        let transformer = DatasetTransformer::new(&vocabulary);
        let train: EncodedDataset = store.load_or_build(TRAIN_DATA, || {
            let corpus = train_split()?;
            Ok(transformer.transform(&corpus, false))
        })?;
        tracing::info!("Train set: {} labelled pairs", train.len());

        // ── Step 5: Test split ────────────────────────────────────────────────
        let test: EncodedDataset = store.load_or_build(TEST_DATA, || {
            let corpus = load_split(TEST_FILE)?;
            Ok(transformer.transform(&corpus, true))
        })?;
        tracing::info!("Test set: {} pairs", test.len());

        // ── Step 6: Embedding matrix ──────────────────────────────────────────
        let embeddings: EmbeddingMatrix = store.load_or_build(EMBEDDINGS, || {
            let mut rng = StdRng::seed_from_u64(cfg.seed);
            EmbeddingBuilder::new(&vocabulary).build_from_file(&cfg.embeddings_file, &mut rng)
        })?;
        tracing::info!("Embedding matrix: {}x{}", embeddings.rows(), embeddings.dim());

        Ok(())
    }
}
