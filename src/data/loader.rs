// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// The corpus is split over two kinds of CSV file:
//
//   question file   id,words,chars          (header skipped)
//                   q000001,借 钱,借 钱       one row per sentence
//
//   pair files      q1,q2,label              (header skipped)
//                   q000001,q000002,1        train.csv
//                   q000003,q000004,         test.csv (label empty)
//
// The loader looks each id up in the question table, picks the
// word- or char-segmented column, tokenises it with the
// Preprocessor and collects a RawCorpus. The label is always
// the LAST field of a pair row, kept as a raw string. Label
// filtering happens later in the transformer.
//
// Rows are split on ',' with no quoting, matching the corpus
// format.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::Preprocessor;
use crate::domain::{corpus::RawCorpus, error::PipelineError};

/// Which segmentation of the question text to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenLevel {
    Word,
    #[default]
    Char,
}

/// id → (word-segmented text, char-segmented text)
#[derive(Debug, Clone, Default)]
pub struct QuestionTable {
    words: HashMap<String, String>,
    chars: HashMap<String, String>,
}

impl QuestionTable {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read question file '{}'", path.display()))?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse the CSV body. A two-column `id,text` file is accepted
    /// and serves the same text for both token levels.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut table = Self::default();

        for (line_no, line) in text.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let words = fields.get(1).ok_or_else(|| PipelineError::MissingColumn {
                path:   source.to_string(),
                line:   line_no + 1,
                column: 1,
            })?;
            let chars = fields.get(2).unwrap_or(words);

            table.words.insert(fields[0].to_string(), words.to_string());
            table.chars.insert(fields[0].to_string(), chars.to_string());
        }

        tracing::debug!("Question table '{}': {} entries", source, table.len());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn text(&self, id: &str, level: TokenLevel) -> Option<&str> {
        let map = match level {
            TokenLevel::Word => &self.words,
            TokenLevel::Char => &self.chars,
        };
        map.get(id).map(String::as_str)
    }
}

/// Reads labelled pair files against a question table.
pub struct PairLoader<'a> {
    questions:    &'a QuestionTable,
    preprocessor: Preprocessor,
    level:        TokenLevel,
}

impl<'a> PairLoader<'a> {
    pub fn new(questions: &'a QuestionTable, preprocessor: Preprocessor, level: TokenLevel) -> Self {
        Self { questions, preprocessor, level }
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<RawCorpus> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read pair file '{}'", path.display()))?;
        let corpus = self.parse(&text, &path.display().to_string())?;
        tracing::info!("Read {} sentence pairs from '{}'", corpus.len(), path.display());
        Ok(corpus)
    }

    pub fn parse(&self, text: &str, source: &str) -> Result<RawCorpus> {
        let mut corpus = RawCorpus::default();

        for (line_no, line) in text.lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 2 {
                return Err(PipelineError::MissingColumn {
                    path:   source.to_string(),
                    line:   line_no + 1,
                    column: 1,
                }
                .into());
            }

            let premise    = self.sentence(fields[0])?;
            let hypothesis = self.sentence(fields[1])?;
            // A two-field test row has no label column: the last field is
            // the hypothesis id, which simply falls outside the label domain.
            let label = fields[fields.len() - 1];

            corpus.push(premise, hypothesis, label);
        }

        Ok(corpus)
    }

    fn sentence(&self, id: &str) -> Result<Vec<String>> {
        let text = self
            .questions
            .text(id, self.level)
            .ok_or_else(|| PipelineError::UnknownQuestionId { id: id.to_string() })?;
        Ok(self.preprocessor.tokenize(text))
    }
}
