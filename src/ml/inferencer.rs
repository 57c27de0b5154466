// ============================================================
// Layer 5 — Inferencer
// ============================================================
use anyhow::Result;

use crate::data::batcher::Batch;
use crate::domain::traits::Classifier;
use crate::infra::checkpoint::{load_module, CheckpointManager};
use crate::ml::model::{class_probabilities, TextClassifier};
use crate::ml::{default_device, ComputeDevice, InferBackend};

/// A trained level model loaded for prediction only.
pub struct Inferencer {
    model:  TextClassifier<InferBackend>,
    ydim:   usize,
    device: ComputeDevice,
}

impl Inferencer {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = default_device();
        let cfg    = ckpt_manager.load_config()?;
        let model: TextClassifier<InferBackend> = cfg.model.init(&device);
        let model  = load_module::<InferBackend, _>(model, &ckpt_manager.model_path(), &device)?;
        tracing::info!("Level {} model loaded from '{}'", cfg.level, ckpt_manager.dir().display());
        Ok(Self { model, ydim: cfg.model.ydim, device })
    }
}

impl Classifier for Inferencer {
    fn num_classes(&self) -> usize {
        self.ydim
    }

    fn predict_proba(&self, batch: &Batch) -> Result<Vec<Vec<f32>>> {
        class_probabilities(&self.model, batch, &self.device)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::LevelConfig;
    use crate::domain::example::Level;
    use crate::domain::traits::LevelModel;
    use crate::ml::level_model::BurnLevelModel;
    use crate::ml::model::{EncoderKind, TextClassifierConfig};
    use crate::ml::optim::OptimizerKind;
    use crate::ml::trainer::TrainOptions;
    use crate::ml::TrainBackend;
    use burn::optim::SgdConfig;

    #[test]
    fn test_loads_what_training_saved() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_level(tmp.path(), Level::Two).unwrap();

        let model_cfg = TextClassifierConfig::new(10, 6, 4, EncoderKind::Gru);
        let cfg = LevelConfig {
            level:        Level::Two,
            model:        model_cfg.clone(),
            optimizer:    OptimizerKind::Sgd,
            lrate:        0.1,
            decay_c:      0.0,
            training:     TrainOptions::default(),
            reload_model: None,
        };
        ckpt.save_config(&cfg).unwrap();

        let optim = SgdConfig::new().init::<TrainBackend, TextClassifier<TrainBackend>>();
        let mut trained = BurnLevelModel::new(model_cfg, optim, 0.1, 0.0, default_device());
        let a: &[u32] = &[2, 3];
        let b: &[u32] = &[4, 5, 6];
        let batch = Batch::from_sequences(&[a, b], vec![1, 3]);
        trained.train_step(&batch).unwrap();
        trained.save_params(&trained.snapshot(), &ckpt.model_path()).unwrap();

        let loaded = Inferencer::from_checkpoint(&ckpt).unwrap();
        assert_eq!(loaded.num_classes(), 4);
        let expected = trained.predict_proba(&batch).unwrap();
        let actual   = loaded.predict_proba(&batch).unwrap();
        for (x, y) in expected.iter().flatten().zip(actual.iter().flatten()) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
