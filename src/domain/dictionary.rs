// ============================================================
// Layer 3 — Dictionary
// ============================================================
// One id space shared by words and augmentation tokens:
//
//   0                 [PAD]
//   1                 [UNK]
//   2 .. 2+W          the W most frequent training words
//   2+W ..            one token per department, e.g. <department:Audio>
//   ..  len()         one token per category,   e.g. <category:Headphones>
//
// Level 2 inputs get the department token appended, level 3
// inputs get the category token. Level 3 labels never need a
// token because nothing sits below them.
//
// Label ids are dense per level, assigned in sorted name order
// so that the same corpus always produces the same ids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::example::{Level, LEVELS};

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    /// id → token text
    tokens: Vec<String>,

    /// Number of leading entries that are plain words (specials included)
    word_count: usize,

    /// Per level, label id → label name
    label_names: [Vec<String>; LEVELS],

    /// For levels 1 and 2, label id → augmentation token id
    augmentation: [Vec<u32>; LEVELS - 1],

    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl Dictionary {
    /// Build the dictionary from training word counts and the label names.
    ///
    /// `n_words` caps the word part of the id space, specials included.
    /// Ties in frequency are broken alphabetically.
    pub fn build(
        word_counts: HashMap<String, usize>,
        n_words:     usize,
        label_names: [Vec<String>; LEVELS],
    ) -> Self {
        let mut words: Vec<(String, usize)> = word_counts.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(n_words.saturating_sub(2));

        let mut tokens = vec![PAD_TOKEN.to_string(), UNK_TOKEN.to_string()];
        tokens.extend(words.into_iter().map(|(w, _)| w));
        let word_count = tokens.len();

        let mut augmentation: [Vec<u32>; LEVELS - 1] = Default::default();
        for level in [Level::One, Level::Two] {
            for name in &label_names[level.index()] {
                augmentation[level.index()].push(tokens.len() as u32);
                tokens.push(augmentation_token_text(level, name));
            }
        }

        let mut dict = Self { tokens, word_count, label_names, augmentation, index: HashMap::new() };
        dict.reindex();
        dict
    }

    /// Parse a dictionary saved with `serde_json` and rebuild the lookup index.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut dict: Dictionary = serde_json::from_str(json)?;
        dict.reindex();
        Ok(dict)
    }

    fn reindex(&mut self) {
        self.index = self
            .tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
    }

    /// Total id space size (the embedding table height).
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Word entries, `[PAD]` and `[UNK]` included, in id order.
    pub fn words(&self) -> &[String] {
        &self.tokens[..self.word_count]
    }

    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Number of classes at a level.
    pub fn ydim(&self, level: Level) -> usize {
        self.label_names[level.index()].len()
    }

    pub fn label_names(&self, level: Level) -> &[String] {
        &self.label_names[level.index()]
    }

    pub fn label_name(&self, level: Level, label: usize) -> Option<&str> {
        self.label_names[level.index()].get(label).map(String::as_str)
    }

    pub fn label_id(&self, level: Level, name: &str) -> Option<usize> {
        // Names are sorted at build time.
        self.label_names[level.index()]
            .binary_search_by(|n| n.as_str().cmp(name))
            .ok()
    }

    /// Token id that stands for `label` of `level` when appended to a child's input.
    pub fn augmentation_token(&self, level: Level, label: usize) -> Option<u32> {
        self.augmentation
            .get(level.index())
            .and_then(|ids| ids.get(label))
            .copied()
    }

    /// Inverse of [`Dictionary::augmentation_token`].
    pub fn augmented_label(&self, level: Level, token: u32) -> Option<usize> {
        self.augmentation
            .get(level.index())
            .and_then(|ids| ids.iter().position(|&id| id == token))
    }
}

fn augmentation_token_text(level: Level, name: &str) -> String {
    format!("<{}:{}>", level.name(), name)
}
