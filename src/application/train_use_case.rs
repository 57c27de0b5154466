// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full pipeline in order:
//
//   Step 1: Load train.jsonl / test.jsonl  (Layer 4 - data)
//   Step 2: Build the dictionary           (Layer 3 - domain)
//   Step 3: Build the tokenizer            (Layer 6 - infra)
//   Step 4: Encode, filter and split       (Layer 4 - data)
//   Step 5: Train level 1, 2, 3 in turn    (Layer 5 - ml)
//           each child level sees its parent's label token;
//           on the test split that token is the parent level's
//           own prediction
//   Step 6: Joint beam decoding + scoring  (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{anyhow, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tokenizers::Tokenizer;

use crate::application::decode_use_case::decode_and_score;
use crate::data::{
    augmenter::FeatureAugmenter,
    dataset::LevelData,
    loader::{JsonlLoader, ProductRecord, RawCorpus},
    preprocessor::Preprocessor,
    splitter::{split_train_valid, subsample},
};
use crate::domain::{
    dictionary::Dictionary,
    example::{Dataset, Example, Level, Split, LEVELS},
    prediction::ErrorComparison,
    traits::DatasetSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    interrupt::InterruptFlag,
    tokenizer_store::{encode, TokenizerStore},
};
use crate::ml::{
    decoder::BeamScoring,
    level_model::train_level,
    model::{EncoderKind, TextClassifierConfig},
    optim::OptimizerKind,
    trainer::{LevelReport, StopReason, StopRule, TrainOptions},
};

// ─── Level Configuration ─────────────────────────────────────────────────────
// Everything needed to rebuild and retrain one level's model.
// Saved as level_<n>/config.json before training starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level:        Level,
    pub model:        TextClassifierConfig,
    pub optimizer:    OptimizerKind,
    pub lrate:        f64,
    pub decay_c:      f64,
    pub training:     TrainOptions,
    /// Parameter record to warm start from, without extension
    pub reload_model: Option<PathBuf>,
}

// ─── Pipeline Configuration ──────────────────────────────────────────────────
// All hyperparameters for a run. Saved as pipeline.json so the
// decode command can rebuild the exact same test split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset:          PathBuf,
    pub output:           PathBuf,
    /// Word ids including [PAD] and [UNK]
    pub n_words:          usize,
    /// Longer training sequences are dropped; `None` keeps all
    pub maxlen:           Option<usize>,
    pub dim_proj:         usize,
    pub encoder:          EncoderKind,
    pub use_dropout:      bool,
    pub decay_c:          f64,
    pub lrate:            f64,
    pub optimizer:        OptimizerKind,
    pub batch_size:       usize,
    pub valid_batch_size: usize,
    pub patience:         usize,
    pub max_epochs:       usize,
    pub disp_freq:        usize,
    pub valid_freq:       Option<usize>,
    pub save_freq:        Option<usize>,
    pub stop_rule:        StopRule,
    pub seed:             u64,
    pub valid_portion:    f64,
    pub train_size:       Option<usize>,
    pub test_size:        Option<usize>,
    pub beam:             usize,
    pub scoring:          BeamScoring,
    pub resume:           bool,
    /// Run directory whose level models warm start this run
    pub reload:           Option<PathBuf>,
    /// Levels below this one are loaded from disk instead of trained
    pub start_level:      u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let training = TrainOptions::default();
        Self {
            dataset:          PathBuf::from("data/products"),
            output:           PathBuf::from("runs/latest"),
            n_words:          50_000,
            maxlen:           Some(100),
            dim_proj:         128,
            encoder:          EncoderKind::Lstm,
            use_dropout:      true,
            decay_c:          0.0,
            lrate:            1e-4,
            optimizer:        OptimizerKind::Adadelta,
            batch_size:       training.batch_size,
            valid_batch_size: training.valid_batch_size,
            patience:         training.patience,
            max_epochs:       training.max_epochs,
            disp_freq:        training.disp_freq,
            valid_freq:       training.valid_freq,
            save_freq:        training.save_freq,
            stop_rule:        training.stop_rule,
            seed:             training.seed,
            valid_portion:    0.1,
            train_size:       None,
            test_size:        None,
            beam:             5,
            scoring:          BeamScoring::Rerank,
            resume:           false,
            reload:           None,
            start_level:      1,
        }
    }
}

impl PipelineConfig {
    pub fn level_config(&self, level: Level, ydim: usize, n_words: usize) -> LevelConfig {
        LevelConfig {
            level,
            model: TextClassifierConfig::new(n_words, self.dim_proj, ydim, self.encoder)
                .with_use_dropout(self.use_dropout),
            optimizer: self.optimizer,
            lrate:     self.lrate,
            decay_c:   self.decay_c,
            training:  TrainOptions {
                patience:         self.patience,
                max_epochs:       self.max_epochs,
                disp_freq:        self.disp_freq,
                valid_freq:       self.valid_freq,
                save_freq:        self.save_freq,
                batch_size:       self.batch_size,
                valid_batch_size: self.valid_batch_size,
                stop_rule:        self.stop_rule,
                seed:             self.seed,
                resume:           self.resume,
            },
            reload_model: self.reload.as_ref().map(|dir| dir.join(level.dir_name()).join("model")),
        }
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.output)?;
        let path = self.output.join("pipeline.json");
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    pub fn load(output: &Path) -> Result<Self> {
        let path = output.join("pipeline.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'. Have you run 'train' first?", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Cannot parse '{}'", path.display()))
    }
}

// ─── Dataset preparation ─────────────────────────────────────────────────────

/// Count words over the cleaned training descriptions and build the dictionary.
pub fn build_dictionary(corpus: &RawCorpus, n_words: usize) -> Dictionary {
    let preprocessor = Preprocessor::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in &corpus.train {
        for word in preprocessor.words(&preprocessor.clean(&record.text)) {
            *counts.entry(word).or_default() += 1;
        }
    }
    tracing::info!("{} distinct training words, keeping at most {}", counts.len(), n_words);
    Dictionary::build(counts, n_words, corpus.label_names())
}

/// Encode the corpus and cut it into train / valid / test.
///
/// The split depends only on the corpus and `cfg.seed`, so decoding
/// a finished run rebuilds the same test set.
pub fn encode_dataset(
    corpus:     &RawCorpus,
    dictionary: &Dictionary,
    tokenizer:  &Tokenizer,
    cfg:        &PipelineConfig,
) -> Result<Dataset> {
    let preprocessor = Preprocessor::new();
    let encode_all = |name: &str, records: &[ProductRecord]| -> Result<Vec<Example>> {
        let mut examples = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let tokens = encode(tokenizer, &preprocessor.clean(&record.text))?;
            if tokens.is_empty() {
                continue;
            }
            let mut labels = [0usize; LEVELS];
            for level in Level::ALL {
                let label = record.label(level);
                labels[level.index()] = dictionary.label_id(level, label).ok_or_else(|| {
                    anyhow!("{name} record {}: unknown {} '{}'", i + 1, level.name(), label)
                })?;
            }
            examples.push(Example { tokens, labels });
        }
        Ok(examples)
    };

    let mut train = encode_all("train", &corpus.train)?;
    let test      = encode_all("test", &corpus.test)?;

    if let Some(maxlen) = cfg.maxlen {
        let before = train.len();
        train.retain(|ex| ex.tokens.len() <= maxlen);
        tracing::info!("Dropped {} training examples longer than {}", before - train.len(), maxlen);
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let (train, valid) = split_train_valid(train, cfg.valid_portion, &mut rng);
    let train = subsample(train, cfg.train_size, &mut rng);
    let valid = subsample(valid, cfg.train_size.map(|n| n / 10), &mut rng);
    let test  = subsample(test, cfg.test_size, &mut rng);

    tracing::info!("{} train examples", train.len());
    tracing::info!("{} valid examples", valid.len());
    tracing::info!("{} test examples", test.len());

    Ok(Dataset {
        train: Split::from_examples(train),
        valid: Split::from_examples(valid),
        test:  Split::from_examples(test),
    })
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config:    PipelineConfig,
    interrupt: InterruptFlag,
}

impl TrainUseCase {
    pub fn new(config: PipelineConfig, interrupt: InterruptFlag) -> Self {
        Self { config, interrupt }
    }

    /// Train the three levels, then decode and score the test split.
    ///
    /// Returns `None` when the run was interrupted; the finished levels
    /// stay on disk and `--start-level` / `--resume` pick the run up.
    pub fn execute(&self) -> Result<Option<ErrorComparison>> {
        let cfg   = &self.config;
        let start = Instant::now();
        let first = Level::from_number(cfg.start_level)?;

        // ── Step 1: Load the raw records ──────────────────────────────────────
        let corpus = JsonlLoader::new(&cfg.dataset).load()?;

        // ── Step 2 + 3: Dictionary and tokenizer ──────────────────────────────
        // A run that skips levels must keep the ids its saved models were
        // trained with.
        let store = TokenizerStore::new(&cfg.output);
        let (dictionary, tokenizer) = if first == Level::One {
            let dictionary = build_dictionary(&corpus, cfg.n_words);
            store.save_dictionary(&dictionary)?;
            let tokenizer = store.build(&dictionary)?;
            (dictionary, tokenizer)
        } else {
            (store.load_dictionary()?, store.load()?)
        };
        cfg.save()?;

        // ── Step 4: Encode, filter and split ──────────────────────────────────
        let dataset = encode_dataset(&corpus, &dictionary, &tokenizer, cfg)?;

        // ── Step 5: Train the levels in order ─────────────────────────────────
        let augmenter = FeatureAugmenter::new(&dictionary);
        let mut reports: Vec<LevelReport> = Vec::with_capacity(LEVELS);

        for level in Level::ALL {
            let checkpoints = CheckpointManager::for_level(&cfg.output, level)?;

            let report = if level < first {
                tracing::info!("Level {level}: using the model already in '{}'", checkpoints.dir().display());
                checkpoints
                    .load_history()?
                    .report
                    .ok_or_else(|| anyhow!("level {level} has no final report; train it first"))?
            } else {
                let test_parents = reports.last().map(|r| r.predictions.as_slice());
                let augmented    = augmenter.augment_dataset(&dataset, level, test_parents)?;
                let data         = LevelData::new(&augmented, level);

                let level_cfg = cfg.level_config(level, dictionary.ydim(level), dictionary.len());
                checkpoints.save_config(&level_cfg)?;

                tracing::info!(
                    "Level {level} ({}): {} labels, {} train / {} valid / {} test",
                    level.name(),
                    dictionary.ydim(level),
                    data.train.len(),
                    data.valid.len(),
                    data.test.len()
                );
                train_level(&level_cfg, &data, &checkpoints, self.interrupt.clone())?
            };

            if report.stop_reason == StopReason::Interrupted {
                tracing::warn!("Interrupted during level {level}; later levels were not trained");
                return Ok(None);
            }
            reports.push(report);
        }
        tracing::info!("Training took {:.1}s", start.elapsed().as_secs_f64());

        // ── Step 6: Joint decoding and error comparison ───────────────────────
        let comparison = decode_and_score(cfg, &dictionary, &dataset.test, &reports)?;
        Ok(Some(comparison))
    }
}
