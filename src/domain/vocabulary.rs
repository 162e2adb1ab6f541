// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Maps every token of the training corpus to a stable integer id.
//
// Id layout:
//   0 → _PAD_   (padding, embedding row stays zero)
//   1 → _OOV_   (any token not in the vocabulary)
//   2 → _BOS_   (prepended to every sentence)
//   3 → _EOS_   (appended to every sentence)
//   4..        → corpus tokens, most frequent first
//
// Frequency ties keep the order in which tokens were first seen,
// so the same corpus always produces the same ids.
//
// On disk the vocabulary is a flat JSON object {token: id}.
// Deserialising validates the reserved ids and contiguity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const PAD: &str = "_PAD_";
pub const OOV: &str = "_OOV_";
pub const BOS: &str = "_BOS_";
pub const EOS: &str = "_EOS_";

pub const PAD_ID: usize = 0;
pub const OOV_ID: usize = 1;
pub const BOS_ID: usize = 2;
pub const EOS_ID: usize = 3;

const RESERVED: [&str; 4] = [PAD, OOV, BOS, EOS];

/// Immutable token ↔ id mapping shared by every downstream stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "HashMap<String, usize>", try_from = "HashMap<String, usize>")]
pub struct Vocabulary {
    token_to_id: HashMap<String, usize>,
    /// Inverse map — index is the id
    id_to_token: Vec<String>,
}

impl Vocabulary {
    /// Count tokens across all premises and hypotheses and keep the
    /// `num_words` most frequent (all of them when `None`).
    pub fn build<'a, I, S>(sentences: I, num_words: Option<usize>) -> Self
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<[String]> + 'a + ?Sized,
    {
        // Vec keeps first-seen order, the map only points into it
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();

        for sentence in sentences {
            for token in sentence.as_ref() {
                let token = token.as_str();
                if RESERVED.contains(&token) {
                    continue;
                }
                match position.get(token) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        position.insert(token, counts.len());
                        counts.push((token, 1));
                    }
                }
            }
        }

        // sort_by is stable: equal counts stay in first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(limit) = num_words {
            counts.truncate(limit);
        }

        let mut id_to_token: Vec<String> = RESERVED.iter().map(|t| t.to_string()).collect();
        id_to_token.extend(counts.into_iter().map(|(t, _)| t.to_string()));

        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(id, t)| (t.clone(), id))
            .collect();

        tracing::debug!("Vocabulary built with {} entries", id_to_token.len());
        Self { token_to_id, id_to_token }
    }

    /// Number of ids, reserved ones included
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.token_to_id.get(token).copied()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.id_to_token.get(id).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Iterate (id, token) pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.id_to_token.iter().enumerate().map(|(i, t)| (i, t.as_str()))
    }

    /// `[BOS] + ids + [EOS]`, unknown tokens become OOV. Never fails.
    pub fn encode<S: AsRef<str>>(&self, sentence: &[S]) -> Vec<usize> {
        let mut ids = Vec::with_capacity(sentence.len() + 2);
        ids.push(BOS_ID);
        ids.extend(
            sentence
                .iter()
                .map(|t| self.id(t.as_ref()).unwrap_or(OOV_ID)),
        );
        ids.push(EOS_ID);
        ids
    }
}

impl From<Vocabulary> for HashMap<String, usize> {
    fn from(v: Vocabulary) -> Self {
        v.token_to_id
    }
}

impl TryFrom<HashMap<String, usize>> for Vocabulary {
    type Error = String;

    fn try_from(token_to_id: HashMap<String, usize>) -> Result<Self, Self::Error> {
        let mut id_to_token = vec![None; token_to_id.len()];
        for (token, &id) in &token_to_id {
            let slot = id_to_token
                .get_mut(id)
                .ok_or_else(|| format!("id {id} of '{token}' leaves a gap in the id range"))?;
            if let Some(other) = slot {
                return Err(format!("id {id} is shared by '{other}' and '{token}'"));
            }
            *slot = Some(token.clone());
        }
        // Every slot is filled: ids are unique and within 0..len
        let id_to_token: Vec<String> = id_to_token.into_iter().flatten().collect();

        for (id, reserved) in RESERVED.iter().enumerate() {
            if id_to_token.get(id).map(String::as_str) != Some(*reserved) {
                return Err(format!("reserved id {id} must map to '{reserved}'"));
            }
        }

        Ok(Self { token_to_id, id_to_token })
    }
}
