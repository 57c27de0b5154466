// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Loads labelled product records from a dataset directory:
//
//   <dataset>/
//     train.jsonl   ← one JSON object per line
//     test.jsonl
//
// Each line looks like:
//
//   {"text": "Over-ear wireless headphones",
//    "department": "Electronics",
//    "category": "Audio",
//    "subcategory": "Headphones"}
//
// `description` is accepted for `text`, and `cat1` / `cat2` /
// `cat3` for the three category columns. Blank lines are
// skipped; a malformed line is an error that names the file and
// the line number.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::example::{Level, LEVELS};
use crate::domain::traits::DatasetSource;

/// One raw product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(alias = "description")]
    pub text:        String,
    #[serde(alias = "cat1")]
    pub department:  String,
    #[serde(alias = "cat2")]
    pub category:    String,
    #[serde(alias = "cat3")]
    pub subcategory: String,
}

impl ProductRecord {
    pub fn label(&self, level: Level) -> &str {
        match level {
            Level::One   => &self.department,
            Level::Two   => &self.category,
            Level::Three => &self.subcategory,
        }
    }
}

/// The raw train and test records of a dataset directory.
#[derive(Debug, Clone, Default)]
pub struct RawCorpus {
    pub train: Vec<ProductRecord>,
    pub test:  Vec<ProductRecord>,
}

impl RawCorpus {
    /// Sorted distinct label names per level, over both files.
    pub fn label_names(&self) -> [Vec<String>; LEVELS] {
        Level::ALL.map(|level| {
            self.train
                .iter()
                .chain(&self.test)
                .map(|r| r.label(level).to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }
}

/// Loads `train.jsonl` and `test.jsonl` from a directory.
pub struct JsonlLoader {
    dir: PathBuf,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DatasetSource for JsonlLoader {
    fn load(&self) -> Result<RawCorpus> {
        if !self.dir.is_dir() {
            bail!("dataset directory '{}' does not exist", self.dir.display());
        }

        let train = read_jsonl(&self.dir.join("train.jsonl"))?;
        let test  = read_jsonl(&self.dir.join("test.jsonl"))?;

        tracing::info!(
            "Loaded {} training and {} test records from '{}'",
            train.len(),
            test.len(),
            self.dir.display()
        );
        Ok(RawCorpus { train, test })
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<ProductRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed record", path.display(), i + 1))
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_loads_both_files_and_aliases() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "train.jsonl",
            "{\"text\":\"red mug\",\"department\":\"Home\",\"category\":\"Kitchen\",\"subcategory\":\"Mugs\"}\n\n\
             {\"description\":\"usb cable\",\"cat1\":\"Electronics\",\"cat2\":\"Cables\",\"cat3\":\"USB\"}\n",
        );
        write(
            tmp.path(),
            "test.jsonl",
            "{\"text\":\"hdmi cable\",\"department\":\"Electronics\",\"category\":\"Cables\",\"subcategory\":\"HDMI\"}\n",
        );

        let corpus = JsonlLoader::new(tmp.path()).load().unwrap();
        assert_eq!(corpus.train.len(), 2);
        assert_eq!(corpus.train[1].text, "usb cable");
        assert_eq!(corpus.train[1].label(Level::Three), "USB");

        let names = corpus.label_names();
        assert_eq!(names[0], vec!["Electronics", "Home"]);
        assert_eq!(names[2], vec!["HDMI", "Mugs", "USB"]);
    }

    #[test]
    fn test_malformed_line_names_the_line() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "train.jsonl", "{\"text\":\"x\"}\n");
        write(tmp.path(), "test.jsonl", "");
        let err = JsonlLoader::new(tmp.path()).load().unwrap_err();
        assert!(format!("{err:#}").contains("train.jsonl:1"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(JsonlLoader::new("/definitely/not/here").load().is_err());
    }
}
