// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Persists the preprocessing outputs as JSON files keyed by
// name inside one directory:
//
//   worddict.json     Vocabulary            {token: id}
//   train_data.json   EncodedDataset        premises / hypotheses / labels
//   test_data.json    EncodedDataset        labels are placeholders
//   embeddings.json   EmbeddingMatrix       rows, dim, values
//
// load_or_build() returns the stored artifact when the file
// exists and only runs the builder otherwise, so rerunning the
// preprocessing step never regenerates (or re-randomises) an
// artifact that downstream stages may already depend on.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

pub const VOCABULARY: &str = "worddict.json";
pub const TRAIN_DATA: &str = "train_data.json";
pub const TEST_DATA: &str = "test_data.json";
pub const EMBEDDINGS: &str = "embeddings.json";

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create the store, making the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create artifact directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Load an existing artifact or build, save and return a new one
    pub fn load_or_build<T, F>(&self, name: &str, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if self.exists(name) {
            tracing::info!("Loading existing '{}'", name);
            return self.load(name);
        }

        tracing::info!("Building '{}'", name);
        let artifact = build()?;
        self.save(name, &artifact)?;
        Ok(artifact)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        load_json(self.path(name))
    }

    pub fn save<T: Serialize>(&self, name: &str, artifact: &T) -> Result<()> {
        let path = self.path(name);
        let json = serde_json::to_string(artifact)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write artifact '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }
}

/// Read a JSON artifact from an explicit path (used by the
/// train / test stages, which are configured with file paths).
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'. Has preprocessing been run?", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Cannot parse '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::corpus::{EncodedDataset, EncodedExample};

    #[test]
    fn test_builds_once_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let first: Vec<u32> = store.load_or_build("numbers.json", || Ok(vec![1, 2, 3])).unwrap();
        assert_eq!(first, vec![1, 2, 3]);

        // builder must not run again
        let second: Vec<u32> = store
            .load_or_build("numbers.json", || -> Result<Vec<u32>> { panic!("rebuilt") })
            .unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_dataset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested")).unwrap();

        let mut data = EncodedDataset::default();
        data.push(EncodedExample { premise: vec![2, 9, 3], hypothesis: vec![2, 3], label: 1 });
        store.save(TRAIN_DATA, &data).unwrap();

        let back: EncodedDataset = load_json(store.path(TRAIN_DATA)).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_json::<EncodedDataset>("/definitely/not/here.json").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.json"));
    }
}
