// ============================================================
// Layer 2 — Decode Use Case
// ============================================================
// Joint decoding of a finished run:
//   1. Load pipeline.json, the dictionary and the tokenizer
//   2. Rebuild the test split exactly as training saw it
//   3. Read each level's hard (per-level argmax) predictions
//      from its history.json
//   4. Load the three level models and beam-decode the test set
//   5. Score hard and soft predictions against the targets and
//      write joint_predictions.json and errors.json
//
// The same scoring path runs at the end of `train`.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{fs, path::PathBuf};

use crate::application::train_use_case::{encode_dataset, PipelineConfig};
use crate::data::loader::JsonlLoader;
use crate::domain::{
    dictionary::Dictionary,
    example::{Level, Split, LEVELS},
    prediction::{ErrorComparison, PredictionFile},
    traits::DatasetSource,
};
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::{
    decoder::{BeamScoring, JointBeamDecoder},
    inferencer::Inferencer,
    scorer::ErrorScorer,
    trainer::LevelReport,
};

pub struct DecodeUseCase {
    output:  PathBuf,
    dataset: Option<PathBuf>,
    beam:    Option<usize>,
    scoring: Option<BeamScoring>,
}

impl DecodeUseCase {
    /// Unset overrides fall back to the values saved with the run.
    pub fn new(
        output:  PathBuf,
        dataset: Option<PathBuf>,
        beam:    Option<usize>,
        scoring: Option<BeamScoring>,
    ) -> Self {
        Self { output, dataset, beam, scoring }
    }

    pub fn execute(&self) -> Result<ErrorComparison> {
        let mut cfg = PipelineConfig::load(&self.output)?;
        cfg.output = self.output.clone();
        if let Some(dataset) = &self.dataset {
            cfg.dataset = dataset.clone();
        }
        if let Some(beam) = self.beam {
            cfg.beam = beam;
        }
        if let Some(scoring) = self.scoring {
            cfg.scoring = scoring;
        }

        let store      = TokenizerStore::new(&cfg.output);
        let dictionary = store.load_dictionary()?;
        let tokenizer  = store.load()?;

        let corpus  = JsonlLoader::new(&cfg.dataset).load()?;
        let dataset = encode_dataset(&corpus, &dictionary, &tokenizer, &cfg)?;

        let mut reports = Vec::with_capacity(LEVELS);
        for level in Level::ALL {
            let checkpoints = CheckpointManager::for_level(&cfg.output, level)?;
            let report = checkpoints
                .load_history()?
                .report
                .with_context(|| format!("level {level} has not finished training"))?;
            reports.push(report);
        }

        decode_and_score(&cfg, &dictionary, &dataset.test, &reports)
    }
}

/// Beam-decode `test` with the saved level models, compare against the
/// hard predictions in `reports`, and write the result files.
pub fn decode_and_score(
    cfg:        &PipelineConfig,
    dictionary: &Dictionary,
    test:       &Split,
    reports:    &[LevelReport],
) -> Result<ErrorComparison> {
    if reports.len() != LEVELS {
        bail!("expected {LEVELS} level reports, got {}", reports.len());
    }

    let mut models = Vec::with_capacity(LEVELS);
    for level in Level::ALL {
        models.push(Inferencer::from_checkpoint(&CheckpointManager::for_level(&cfg.output, level)?)?);
    }

    tracing::info!("Decoding {} test examples with beam {} ({:?})", test.len(), cfg.beam, cfg.scoring);
    let decoder = JointBeamDecoder::new(
        [&models[0], &models[1], &models[2]],
        dictionary,
        cfg.beam,
        cfg.scoring,
        cfg.valid_batch_size,
    );
    let decoded = decoder.decode(&test.sequences)?;

    let file = PredictionFile {
        hard_predictions:      std::array::from_fn(|k| reports[k].predictions.clone()),
        hard_prediction_probs: std::array::from_fn(|k| reports[k].pred_probs.clone()),
        soft_pred:             decoded.label_rows(),
        soft_probs:            decoded.soft_probs,
        target:                test.labels.clone(),
    };

    let comparison = ErrorComparison {
        hard: ErrorScorer::score(&file.hard_predictions, &file.target)?,
        soft: ErrorScorer::score(&file.soft_pred, &file.target)?,
    };

    for (name, report) in [("hard", comparison.hard), ("soft", comparison.soft)] {
        tracing::info!(
            "{name} error: all three {:.4}, any two {:.4}, any one {:.4}",
            report.all_three,
            report.any_two,
            report.any_one
        );
    }

    write_json(cfg, "joint_predictions.json", &file)?;
    write_json(cfg, "errors.json", &comparison)?;
    Ok(comparison)
}

fn write_json<T: Serialize>(cfg: &PipelineConfig, name: &str, value: &T) -> Result<()> {
    let path = cfg.output.join(name);
    fs::write(&path, serde_json::to_string(value)?)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::info!("Saved '{}'", path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::tests::{tiny_config, write_dataset};
    use crate::application::train_use_case::TrainUseCase;
    use crate::infra::interrupt::InterruptFlag;

    #[test]
    fn test_decode_reproduces_training_scores() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(tmp.path(), 24, 8);
        let out = tmp.path().join("run");

        let trained = TrainUseCase::new(tiny_config(tmp.path(), &out), InterruptFlag::default())
            .execute()
            .unwrap()
            .unwrap();

        let decoded = DecodeUseCase::new(out.clone(), None, None, None).execute().unwrap();
        assert_eq!(trained, decoded);

        let file: PredictionFile =
            serde_json::from_str(&fs::read_to_string(out.join("joint_predictions.json")).unwrap()).unwrap();
        assert_eq!(file.target[0].len(), 8);
        let ydim3 = TokenizerStore::new(&out).load_dictionary().unwrap().ydim(Level::Three);
        assert_eq!(file.soft_probs.len(), 8);
        assert!(file.soft_probs.iter().all(|row| !row.is_empty() && row.len() <= 2 * ydim3 && row.len() % ydim3 == 0));
    }

    #[test]
    fn test_decode_without_training_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(DecodeUseCase::new(tmp.path().to_path_buf(), None, None, None).execute().is_err());
    }
}
