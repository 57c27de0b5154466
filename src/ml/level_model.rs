// ============================================================
// Layer 5 — Burn Level Model
// ============================================================
// Binds the TextClassifier and a Burn optimiser to the
// LevelModel trait the trainer drives.
//
// Key Burn insight:
//   - Training runs on TrainBackend (Autodiff<..>) for gradients
//   - model.valid() drops autodiff and disables dropout, so
//     every probability the trainer or the decoder reads comes
//     from the inner backend
//   - A snapshot is a plain clone of the module; Burn tensors
//     are immutable, so the clone is unaffected by later steps
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer, RmsPropConfig, SgdConfig},
    prelude::*,
};
use std::path::Path;

use crate::application::train_use_case::LevelConfig;
use crate::data::batcher::Batch;
use crate::data::dataset::LevelData;
use crate::domain::traits::{Classifier, LevelModel};
use crate::infra::checkpoint::{load_module, load_record, save_record, CheckpointManager};
use crate::infra::interrupt::InterruptFlag;
use crate::ml::model::{batch_tensors, class_probabilities, label_tensor, scalar, TextClassifier, TextClassifierConfig};
use crate::ml::optim::{AdadeltaConfig, OptimizerKind};
use crate::ml::trainer::{LevelReport, LevelTrainer};
use crate::ml::{default_device, ComputeDevice, TrainBackend};

type TrainModel = TextClassifier<TrainBackend>;

pub struct BurnLevelModel<O> {
    model:   TrainModel,
    optim:   O,
    config:  TextClassifierConfig,
    lrate:   f64,
    decay_c: f64,
    device:  ComputeDevice,
}

impl<O> BurnLevelModel<O>
where
    O: Optimizer<TrainModel, TrainBackend>,
{
    pub fn new(config: TextClassifierConfig, optim: O, lrate: f64, decay_c: f64, device: ComputeDevice) -> Self {
        let model = config.init::<TrainBackend>(&device);
        Self { model, optim, config, lrate, decay_c, device }
    }

    /// Warm start from a parameter record written by an earlier run.
    pub fn reload(mut self, path: &Path) -> Result<Self> {
        self.model = load_module::<TrainBackend, _>(self.model, path, &self.device)?;
        Ok(self)
    }
}

impl<O> Classifier for BurnLevelModel<O> {
    fn num_classes(&self) -> usize {
        self.config.ydim
    }

    fn predict_proba(&self, batch: &Batch) -> Result<Vec<Vec<f32>>> {
        class_probabilities(&self.model.valid(), batch, &self.device)
    }
}

impl<O> LevelModel for BurnLevelModel<O>
where
    O: Optimizer<TrainModel, TrainBackend>,
{
    type Params = TrainModel;

    fn train_step(&mut self, batch: &Batch) -> Result<f64> {
        let (tokens, mask) = batch_tensors::<TrainBackend>(batch, &self.device);
        let labels         = label_tensor::<TrainBackend>(batch, &self.device);

        let loss = self.model.forward_loss(tokens, mask, labels, self.decay_c);
        let cost = scalar(loss.clone());
        if !cost.is_finite() {
            // Leave the parameters untouched; the trainer aborts the level.
            return Ok(cost);
        }

        let grads  = loss.backward();
        let grads  = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.lrate, self.model.clone(), grads);
        Ok(cost)
    }

    fn snapshot(&self) -> TrainModel {
        self.model.clone()
    }

    fn restore(&mut self, params: &TrainModel) {
        self.model = params.clone();
    }

    fn save_params(&self, params: &TrainModel, path: &Path) -> Result<()> {
        save_record::<TrainBackend, _>(params.clone().into_record(), path)
    }

    fn load_params(&self, path: &Path) -> Result<TrainModel> {
        load_module::<TrainBackend, _>(self.config.init::<TrainBackend>(&self.device), path, &self.device)
    }

    fn save_state(&self, dir: &Path) -> Result<()> {
        save_record::<TrainBackend, _>(self.model.clone().into_record(), &dir.join("live"))?;
        save_record::<TrainBackend, _>(self.optim.to_record(), &dir.join("optimizer"))
    }

    fn load_state(mut self, dir: &Path) -> Result<Self> {
        self.model = load_module::<TrainBackend, _>(self.model, &dir.join("live"), &self.device)?;
        let record = load_record::<TrainBackend, O::Record>(&dir.join("optimizer"), &self.device)?;
        self.optim = self.optim.load_record(record);
        Ok(self)
    }
}

/// Train one level with the optimiser named in its config.
pub fn train_level(
    cfg:         &LevelConfig,
    data:        &LevelData,
    checkpoints: &CheckpointManager,
    interrupt:   InterruptFlag,
) -> Result<LevelReport> {
    tracing::info!("Level {}: optimiser {:?}, encoder {:?}", cfg.level, cfg.optimizer, cfg.model.encoder);
    match cfg.optimizer {
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init::<TrainBackend, TrainModel>();
            run_level(cfg, data, checkpoints, interrupt, optim)
        }
        OptimizerKind::Adadelta => {
            let optim = AdadeltaConfig::new().init::<TrainBackend, TrainModel>();
            run_level(cfg, data, checkpoints, interrupt, optim)
        }
        OptimizerKind::RmsProp => {
            let optim = RmsPropConfig::new()
                .with_alpha(0.95)
                .with_momentum(0.9)
                .with_centered(true)
                .with_epsilon(1e-4)
                .init::<TrainBackend, TrainModel>();
            run_level(cfg, data, checkpoints, interrupt, optim)
        }
    }
}

fn run_level<O>(
    cfg:         &LevelConfig,
    data:        &LevelData,
    checkpoints: &CheckpointManager,
    interrupt:   InterruptFlag,
    optim:       O,
) -> Result<LevelReport>
where
    O: Optimizer<TrainModel, TrainBackend>,
{
    let mut model = BurnLevelModel::new(cfg.model.clone(), optim, cfg.lrate, cfg.decay_c, default_device());
    if let Some(path) = &cfg.reload_model {
        tracing::info!("Level {}: warm start from '{}'", cfg.level, path.display());
        model = model.reload(path)?;
    }

    let outcome = LevelTrainer::new(cfg.level, model, &cfg.training, data, checkpoints, interrupt).run()?;
    Ok(outcome.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::EncoderKind;
    use burn::optim::adaptor::OptimizerAdaptor;
    use crate::ml::optim::Adadelta;

    type TestModel = BurnLevelModel<OptimizerAdaptor<Adadelta, TrainModel, TrainBackend>>;

    fn model() -> TestModel {
        let config = TextClassifierConfig::new(12, 8, 3, EncoderKind::Lstm).with_use_dropout(false);
        let optim  = AdadeltaConfig::new().init::<TrainBackend, TrainModel>();
        BurnLevelModel::new(config, optim, 0.0, 0.0, default_device())
    }

    fn batch() -> Batch {
        let a: &[u32] = &[2, 3, 4];
        let b: &[u32] = &[5, 6];
        let c: &[u32] = &[7];
        Batch::from_sequences(&[a, b, c], vec![0, 1, 2])
    }

    fn close(a: &[Vec<f32>], b: &[Vec<f32>]) -> bool {
        a.iter().flatten().zip(b.iter().flatten()).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn test_train_step_changes_predictions() {
        let mut m  = model();
        let before = m.predict_proba(&batch()).unwrap();
        let cost   = m.train_step(&batch()).unwrap();
        assert!(cost.is_finite() && cost > 0.0);
        let after  = m.predict_proba(&batch()).unwrap();
        assert!(!close(&before, &after));
    }

    #[test]
    fn test_restore_returns_to_snapshot() {
        let mut m  = model();
        let snap   = m.snapshot();
        let before = m.predict_proba(&batch()).unwrap();
        m.train_step(&batch()).unwrap();
        m.restore(&snap);
        assert!(close(&before, &m.predict_proba(&batch()).unwrap()));
    }

    #[test]
    fn test_state_round_trip_continues_identically() {
        let tmp = tempfile::tempdir().unwrap();

        let mut a = model();
        a.train_step(&batch()).unwrap();
        a.save_state(tmp.path()).unwrap();

        // Same live parameters and optimiser state → same next step
        let mut b = model().load_state(tmp.path()).unwrap();
        assert!(close(&a.predict_proba(&batch()).unwrap(), &b.predict_proba(&batch()).unwrap()));
        a.train_step(&batch()).unwrap();
        b.train_step(&batch()).unwrap();
        assert!(close(&a.predict_proba(&batch()).unwrap(), &b.predict_proba(&batch()).unwrap()));
    }

    #[test]
    fn test_params_round_trip() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model");
        let mut m = model();
        m.train_step(&batch()).unwrap();
        m.save_params(&m.snapshot(), &path).unwrap();

        let loaded = m.load_params(&path).unwrap();
        let mut fresh = model();
        fresh.restore(&loaded);
        assert!(close(&m.predict_proba(&batch()).unwrap(), &fresh.predict_proba(&batch()).unwrap()));
    }
}
