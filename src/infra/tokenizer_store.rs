// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Persists the vocabulary artifacts of a run:
//
//   dictionary.json — word table, label names, augmentation ids
//   tokenizer.json  — a HuggingFace WordLevel tokenizer whose
//                     vocab is exactly the dictionary's word part
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. We sidestep the trainer entirely: the
// tokenizer JSON is written by hand from the dictionary and
// loaded back with Tokenizer::from_file, so word ids always
// agree with the embedding rows.
//
// Augmentation tokens are deliberately left out of the tokenizer
// vocab; text can never produce them.

use anyhow::{anyhow, Context, Result};
use std::{fs, path::PathBuf};
use tokenizers::Tokenizer;

use crate::domain::dictionary::{Dictionary, PAD_ID, PAD_TOKEN, UNK_ID, UNK_TOKEN};

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save_dictionary(&self, dictionary: &Dictionary) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join("dictionary.json");
        fs::write(&path, serde_json::to_string(dictionary)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::info!("Dictionary saved ({} ids) to '{}'", dictionary.len(), path.display());
        Ok(())
    }

    pub fn load_dictionary(&self) -> Result<Dictionary> {
        let path = self.dir.join("dictionary.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'. Have you run 'train' first?", path.display()))?;
        Dictionary::from_json(&json)
            .with_context(|| format!("Cannot parse '{}'", path.display()))
    }

    /// Write a WordLevel tokenizer over the dictionary's words and load it back.
    pub fn build(&self, dictionary: &Dictionary) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)?;

        let vocab: serde_json::Map<String, serde_json::Value> = dictionary
            .words()
            .iter()
            .enumerate()
            .map(|(id, w)| (w.clone(), serde_json::json!(id)))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": PAD_ID, "content": PAD_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": UNK_ID, "content": UNK_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": false,
                "strip_accents": false,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let tok_path = self.dir.join("tokenizer.json");
        fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            dictionary.words().len(),
            tok_path.display()
        );
        self.load()
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join("tokenizer.json");
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }
}

/// Encode one cleaned description into dictionary ids.
pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
    Ok(enc.get_ids().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::Level;
    use std::collections::HashMap;

    fn dictionary() -> Dictionary {
        let counts: HashMap<String, usize> =
            [("usb", 4), ("cable", 3), ("red", 1)].into_iter().map(|(w, c)| (w.to_string(), c)).collect();
        Dictionary::build(
            counts,
            100,
            [vec!["Electronics".into()], vec!["Cables".into()], vec!["USB".into()]],
        )
    }

    #[test]
    fn test_tokenizer_ids_match_dictionary() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(tmp.path());
        let dict  = dictionary();
        let tok   = store.build(&dict).unwrap();

        let ids = encode(&tok, "USB cable, blue").unwrap();
        assert_eq!(ids, vec![
            dict.token_id("usb").unwrap(),
            dict.token_id("cable").unwrap(),
            UNK_ID, // ","
            UNK_ID, // "blue"
        ]);
    }

    #[test]
    fn test_dictionary_round_trip_on_disk() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(tmp.path());
        store.save_dictionary(&dictionary()).unwrap();
        let back = store.load_dictionary().unwrap();
        assert_eq!(back.token_id("red"), dictionary().token_id("red"));
        assert_eq!(back.augmentation_token(Level::One, 0), Some(5));
    }
}
