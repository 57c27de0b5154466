// ============================================================
// Layer 5 — Level Trainer
// ============================================================
// Minibatch training of one category level with periodic
// validation, early stopping and resumable checkpoints.
//
// Per update (one minibatch):
//   1. train_step → cost; a non-finite cost aborts the level
//   2. every disp_freq  updates → log epoch, update, cost
//   3. every valid_freq updates → valid/test error, history,
//                                 best snapshot, stop check
//   4. every save_freq  updates → best (or live) parameters,
//                                 live + optimiser state,
//                                 trainer state, history
//
// Between epochs the Ctrl-C flag is polled. Whatever ends the
// loop (patience, max_epochs, interrupt) the level is finalised
// the same way: restore the best snapshot, score all three
// splits, predict the test split, save.
//
// The trainer only sees the LevelModel trait, so everything
// here is exercised in tests with scripted models.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Instant};
use thiserror::Error;

use crate::data::dataset::LevelData;
use crate::data::scheduler::MinibatchScheduler;
use crate::domain::example::Level;
use crate::domain::traits::LevelModel;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::interrupt::InterruptFlag;
use crate::infra::metrics::{HistoryLogger, ValidationRecord};
use crate::ml::scorer::{argmax_rows, pred_error, predict_all};

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("level {level}: cost became {cost} at update {update}")]
    Diverged { level: Level, update: usize, cost: f64 },

    #[error("level {level}: the {split} split is empty")]
    EmptySplit { level: Level, split: &'static str },
}

// ─── Options ──────────────────────────────────────────────────────────────────

/// Which validations count towards patience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopRule {
    /// A validation counts if it is no better than the minimum of the
    /// history excluding its last `patience` entries. A new minimum
    /// resets the counter first, so a tie can still count.
    #[default]
    Window,
    /// Every validation that is not a new minimum counts
    Consecutive,
}

impl FromStr for StopRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consecutive" => Ok(StopRule::Consecutive),
            "window"      => Ok(StopRule::Window),
            other         => Err(format!("unknown stop rule '{other}' (expected consecutive or window)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    pub patience:         usize,
    pub max_epochs:       usize,
    pub disp_freq:        usize,
    /// `None` → once per epoch
    pub valid_freq:       Option<usize>,
    /// `None` → once per epoch
    pub save_freq:        Option<usize>,
    pub batch_size:       usize,
    pub valid_batch_size: usize,
    pub stop_rule:        StopRule,
    /// Seed of the minibatch shuffle
    pub seed:             u64,
    /// Continue from `state.json` when present
    pub resume:           bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            patience:         10,
            max_epochs:       5000,
            disp_freq:        10,
            valid_freq:       Some(370),
            save_freq:        Some(1110),
            batch_size:       16,
            valid_batch_size: 64,
            stop_rule:        StopRule::Window,
            seed:             123,
            resume:           false,
        }
    }
}

/// An unset frequency means once per epoch: `ceil(n_train / batch_size)`.
pub fn resolve_freq(freq: Option<usize>, n_train: usize, batch_size: usize) -> usize {
    match freq {
        Some(f) if f > 0 => f,
        _ => n_train.div_ceil(batch_size.max(1)).max(1),
    }
}

// ─── Early stopping ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// New minimum (ties count): snapshot the parameters
    pub improved: bool,
    /// Patience exhausted
    pub stop:     bool,
}

/// Validation history plus the patience counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopping {
    rule:       StopRule,
    patience:   usize,
    /// (valid_err, test_err) per validation, in order
    history:    Vec<(f64, f64)>,
    best_valid: Option<f64>,
    bad_count:  usize,
}

impl EarlyStopping {
    pub fn new(rule: StopRule, patience: usize) -> Self {
        Self { rule, patience, history: Vec::new(), best_valid: None, bad_count: 0 }
    }

    pub fn observe(&mut self, valid_err: f64, test_err: f64) -> Verdict {
        self.history.push((valid_err, test_err));

        let improved = self.best_valid.map_or(true, |best| valid_err <= best);
        if improved {
            self.best_valid = Some(valid_err);
            self.bad_count  = 0;
        }

        match self.rule {
            StopRule::Consecutive => {
                if !improved {
                    self.bad_count += 1;
                }
            }
            StopRule::Window => {
                let n = self.history.len();
                if n > self.patience {
                    let floor = self.history[..n - self.patience]
                        .iter()
                        .map(|h| h.0)
                        .fold(f64::INFINITY, f64::min);
                    if valid_err >= floor {
                        self.bad_count += 1;
                    }
                }
            }
        }

        Verdict { improved, stop: self.bad_count > self.patience }
    }

    pub fn history(&self) -> &[(f64, f64)] {
        &self.history
    }

    pub fn best_valid(&self) -> Option<f64> {
        self.best_valid
    }

    pub fn bad_count(&self) -> usize {
        self.bad_count
    }
}

// ─── Persisted state ──────────────────────────────────────────────────────────

/// Everything besides parameters needed to continue a level mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    /// Minibatches processed so far
    pub update:           usize,
    /// Zero-based epoch in progress
    pub epoch:            usize,
    /// Minibatches of `epoch` already processed
    pub batches_in_epoch: usize,
    pub stopping:         EarlyStopping,
    /// Whether model.mpk.gz holds a best snapshot (vs. live parameters)
    pub has_best:         bool,
}

impl TrainerState {
    pub fn new(options: &TrainOptions) -> Self {
        Self {
            update:           0,
            epoch:            0,
            batches_in_epoch: 0,
            stopping:         EarlyStopping::new(options.stop_rule, options.patience),
            has_best:         false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EarlyStop,
    Completed,
    Interrupted,
}

/// Final errors and test predictions of a finished level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub level:       Level,
    pub stop_reason: StopReason,
    pub epochs:      usize,
    pub updates:     usize,
    pub train_err:   f64,
    pub valid_err:   f64,
    pub test_err:    f64,
    /// Argmax label per test example
    pub predictions: Vec<usize>,
    /// Probability of that label
    pub pred_probs:  Vec<f32>,
    pub seconds:     f64,
}

/// Contents of `history.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelHistory {
    pub history_errs: Vec<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report:       Option<LevelReport>,
}

/// A finished level: the model holding its best parameters, and the report.
pub struct LevelOutcome<M> {
    pub model:  M,
    pub report: LevelReport,
}

enum EpochOutcome {
    Continue,
    EarlyStop,
    Diverged { cost: f64 },
}

// ─── LevelTrainer ─────────────────────────────────────────────────────────────

pub struct LevelTrainer<'a, M: LevelModel> {
    level:       Level,
    model:       M,
    options:     &'a TrainOptions,
    data:        &'a LevelData,
    checkpoints: &'a CheckpointManager,
    interrupt:   InterruptFlag,
}

impl<'a, M: LevelModel> LevelTrainer<'a, M> {
    pub fn new(
        level:       Level,
        model:       M,
        options:     &'a TrainOptions,
        data:        &'a LevelData,
        checkpoints: &'a CheckpointManager,
        interrupt:   InterruptFlag,
    ) -> Self {
        Self { level, model, options, data, checkpoints, interrupt }
    }

    pub fn run(self) -> Result<LevelOutcome<M>> {
        let LevelTrainer { level, mut model, options, data, checkpoints, interrupt } = self;

        for (name, set) in [("train", &data.train), ("valid", &data.valid), ("test", &data.test)] {
            if set.is_empty() {
                bail!(TrainError::EmptySplit { level, split: name });
            }
        }
        if options.batch_size == 0 || options.valid_batch_size == 0 {
            bail!("level {level}: batch sizes must be at least 1");
        }

        let n_train = data.train.len();
        let loop_ctx = LoopContext {
            level,
            options,
            data,
            checkpoints,
            valid_freq: resolve_freq(options.valid_freq, n_train, options.batch_size),
            save_freq:  resolve_freq(options.save_freq, n_train, options.batch_size),
            disp_freq:  options.disp_freq.max(1),
            history:    HistoryLogger::new(checkpoints.dir())?,
        };

        let mut scheduler = MinibatchScheduler::new(options.seed);
        let mut state     = TrainerState::new(options);
        let mut best_p: Option<M::Params> = None;

        if options.resume {
            if let Some(saved) = checkpoints.load_state()? {
                model = model.load_state(checkpoints.dir())?;
                loop_ctx.history.truncate_after(saved.update)?;
                if saved.has_best {
                    best_p = Some(model.load_params(&checkpoints.model_path())?);
                }
                scheduler.fast_forward(n_train, saved.epoch);
                tracing::info!(
                    "Level {level}: resuming at update {} (epoch {}, batch {})",
                    saved.update, saved.epoch, saved.batches_in_epoch
                );
                state = saved;
            } else {
                tracing::info!("Level {level}: nothing to resume, starting fresh");
            }
        }

        tracing::info!(
            "Level {level}: {} train, {} valid, {} test; {} updates per epoch",
            data.train.len(),
            data.valid.len(),
            data.test.len(),
            n_train.div_ceil(options.batch_size),
        );

        let start       = Instant::now();
        let mut reason  = StopReason::Completed;
        let mut epochs  = state.epoch;

        while state.epoch < options.max_epochs {
            if interrupt.is_set() {
                tracing::warn!("Level {level}: interrupted");
                reason = StopReason::Interrupted;
                break;
            }
            epochs = state.epoch + 1;

            match loop_ctx.run_epoch(&mut model, &mut scheduler, &mut state, &mut best_p)? {
                EpochOutcome::Continue => {
                    state.epoch += 1;
                    state.batches_in_epoch = 0;
                }
                EpochOutcome::EarlyStop => {
                    tracing::info!("Level {level}: early stop at update {}", state.update);
                    reason = StopReason::EarlyStop;
                    break;
                }
                EpochOutcome::Diverged { cost } => {
                    tracing::error!("Level {level}: cost {cost} at update {}", state.update);
                    return Err(TrainError::Diverged { level, update: state.update, cost }.into());
                }
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            "Level {level}: the code ran for {epochs} epochs, with {:.2} sec/epochs",
            elapsed / epochs.max(1) as f64
        );

        // ── Finalise ──────────────────────────────────────────────────────────
        let best = match best_p {
            Some(p) => {
                model.restore(&p);
                p
            }
            None => model.snapshot(),
        };

        let train_err = pred_error(&model, &data.train, options.batch_size)?;
        let valid_err = pred_error(&model, &data.valid, options.valid_batch_size)?;
        let test_err  = pred_error(&model, &data.test, options.valid_batch_size)?;
        let probs     = predict_all(&model, &data.test.sequences, options.valid_batch_size)?;
        let (predictions, pred_probs) = argmax_rows(&probs);

        tracing::info!("Level {level}: Train {train_err:.4} Valid {valid_err:.4} Test {test_err:.4}");

        model.save_params(&best, &checkpoints.model_path())?;
        let report = LevelReport {
            level,
            stop_reason: reason,
            epochs,
            updates: state.update,
            train_err,
            valid_err,
            test_err,
            predictions,
            pred_probs,
            seconds: elapsed,
        };
        checkpoints.save_history(&LevelHistory {
            history_errs: state.stopping.history().to_vec(),
            report:       Some(report.clone()),
        })?;

        Ok(LevelOutcome { model, report })
    }
}

struct LoopContext<'a> {
    level:       Level,
    options:     &'a TrainOptions,
    data:        &'a LevelData,
    checkpoints: &'a CheckpointManager,
    valid_freq:  usize,
    save_freq:   usize,
    disp_freq:   usize,
    history:     HistoryLogger,
}

impl LoopContext<'_> {
    fn run_epoch<M: LevelModel>(
        &self,
        model:     &mut M,
        scheduler: &mut MinibatchScheduler,
        state:     &mut TrainerState,
        best_p:    &mut Option<M::Params>,
    ) -> Result<EpochOutcome> {
        let level     = self.level;
        let partition = scheduler.partition(self.data.train.len(), self.options.batch_size, true)?;
        let mut seen  = 0usize;

        for (position, indices) in partition.into_iter().skip(state.batches_in_epoch) {
            let batch = self.data.train.batch(&indices);
            seen += batch.size;

            state.update += 1;
            state.batches_in_epoch = position + 1;

            let cost = model.train_step(&batch)?;
            if !cost.is_finite() {
                return Ok(EpochOutcome::Diverged { cost });
            }

            if state.update % self.disp_freq == 0 {
                tracing::info!("Level {level}: Epoch {} Update {} Cost {cost:.6}", state.epoch, state.update);
            }

            let mut stop = false;
            if state.update % self.valid_freq == 0 {
                stop = self.validate(model, state, best_p)?;
            }

            if state.update % self.save_freq == 0 {
                if let Err(e) = self.save(model, state, best_p.as_ref()) {
                    tracing::warn!("Level {level}: checkpoint at update {} failed: {e:#}", state.update);
                }
            }

            if stop {
                return Ok(EpochOutcome::EarlyStop);
            }
        }

        tracing::debug!("Level {level}: seen {seen} samples in epoch {}", state.epoch);
        Ok(EpochOutcome::Continue)
    }

    /// Returns true when patience is exhausted.
    fn validate<M: LevelModel>(
        &self,
        model:  &M,
        state:  &mut TrainerState,
        best_p: &mut Option<M::Params>,
    ) -> Result<bool> {
        let valid_err = pred_error(model, &self.data.valid, self.options.valid_batch_size)?;
        let test_err  = pred_error(model, &self.data.test, self.options.valid_batch_size)?;
        let verdict   = state.stopping.observe(valid_err, test_err);

        if verdict.improved {
            *best_p = Some(model.snapshot());
            state.has_best = true;
        }

        tracing::info!(
            "Level {}: Valid {valid_err:.4} Test {test_err:.4} (bad count {})",
            self.level,
            state.stopping.bad_count()
        );

        let record = ValidationRecord {
            update: state.update,
            epoch:  state.epoch,
            valid_err,
            test_err,
            best:   verdict.improved,
        };
        if let Err(e) = self.history.log(&record) {
            tracing::warn!("Level {}: cannot append history row: {e:#}", self.level);
        }

        Ok(verdict.stop)
    }

    fn save<M: LevelModel>(&self, model: &M, state: &TrainerState, best_p: Option<&M::Params>) -> Result<()> {
        tracing::info!("Level {}: saving at update {}", self.level, state.update);
        match best_p {
            Some(p) => model.save_params(p, &self.checkpoints.model_path())?,
            None    => model.save_params(&model.snapshot(), &self.checkpoints.model_path())?,
        }
        model.save_state(self.checkpoints.dir())?;
        self.checkpoints.save_state(state)?;
        self.checkpoints.save_history(&LevelHistory {
            history_errs: state.stopping.history().to_vec(),
            report:       None,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::Batch;
    use crate::data::dataset::LabeledSet;
    use crate::domain::traits::Classifier;
    use std::{fs, path::Path};

    fn set(n: usize, ydim: usize) -> LabeledSet {
        LabeledSet {
            sequences: (0..n).map(|i| vec![i as u32 + 2]).collect(),
            labels:    (0..n).map(|i| i % ydim).collect(),
        }
    }

    fn one_hot(label: usize, ydim: usize) -> Vec<f32> {
        let mut row = vec![0.0; ydim];
        row[label] = 1.0;
        row
    }

    // ── A model whose parameter drifts with the batch order ───────────────────
    struct DriftModel {
        w: f64,
    }

    impl Classifier for DriftModel {
        fn num_classes(&self) -> usize {
            3
        }

        fn predict_proba(&self, batch: &Batch) -> Result<Vec<Vec<f32>>> {
            Ok(batch.labels.iter().map(|_| one_hot(0, 3)).collect())
        }
    }

    impl LevelModel for DriftModel {
        type Params = f64;

        fn train_step(&mut self, batch: &Batch) -> Result<f64> {
            let signal: f64 = batch
                .labels
                .iter()
                .enumerate()
                .map(|(i, &l)| (i as f64 + 1.0) * (l as f64 + 1.0))
                .sum::<f64>()
                / batch.size as f64;
            self.w = 0.7 * self.w + 0.3 * signal + 0.01 * batch.token(0, 0) as f64;
            Ok(self.w)
        }

        fn snapshot(&self) -> f64 {
            self.w
        }

        fn restore(&mut self, params: &f64) {
            self.w = *params;
        }

        fn save_params(&self, params: &f64, path: &Path) -> Result<()> {
            fs::write(path.with_extension("json"), serde_json::to_string(params)?)?;
            Ok(())
        }

        fn load_params(&self, path: &Path) -> Result<f64> {
            Ok(serde_json::from_str(&fs::read_to_string(path.with_extension("json"))?)?)
        }

        fn save_state(&self, dir: &Path) -> Result<()> {
            fs::write(dir.join("live.json"), serde_json::to_string(&self.w)?)?;
            Ok(())
        }

        fn load_state(mut self, dir: &Path) -> Result<Self> {
            self.w = serde_json::from_str(&fs::read_to_string(dir.join("live.json"))?)?;
            Ok(self)
        }
    }

    // ── A model that replays a scripted validation error curve ────────────────
    // Its only parameter is the number of updates it has seen; the k-th
    // validation reads script[k - 1] and gets that share of examples wrong.
    struct ScriptedModel {
        updates: usize,
        script:  Vec<f64>,
        nan_at:  Option<usize>,
    }

    impl Classifier for ScriptedModel {
        fn num_classes(&self) -> usize {
            2
        }

        fn predict_proba(&self, batch: &Batch) -> Result<Vec<Vec<f32>>> {
            let step  = self.updates.max(1).min(self.script.len()) - 1;
            let wrong = (self.script[step] * 10.0).round() as usize;
            Ok((0..batch.size)
                .map(|n| {
                    // Evaluation batches carry no labels; recover them the way `set` assigns them
                    let example = batch.token(0, n) as usize - 2;
                    let label   = example % 2;
                    if example < wrong { one_hot(1 - label, 2) } else { one_hot(label, 2) }
                })
                .collect())
        }
    }

    impl LevelModel for ScriptedModel {
        type Params = usize;

        fn train_step(&mut self, _batch: &Batch) -> Result<f64> {
            self.updates += 1;
            Ok(if Some(self.updates) == self.nan_at { f64::NAN } else { 1.0 })
        }

        fn snapshot(&self) -> usize {
            self.updates
        }

        fn restore(&mut self, params: &usize) {
            self.updates = *params;
        }

        fn save_params(&self, params: &usize, path: &Path) -> Result<()> {
            fs::write(path.with_extension("json"), params.to_string())?;
            Ok(())
        }

        fn load_params(&self, path: &Path) -> Result<usize> {
            Ok(fs::read_to_string(path.with_extension("json"))?.parse()?)
        }

        fn save_state(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }

        fn load_state(self, _dir: &Path) -> Result<Self> {
            Ok(self)
        }
    }

    fn scripted_data() -> LevelData {
        LevelData { train: set(4, 2), valid: set(10, 2), test: set(10, 2) }
    }

    fn scripted_options() -> TrainOptions {
        TrainOptions {
            patience:   2,
            max_epochs: 10,
            valid_freq: Some(1),
            save_freq:  Some(1000),
            batch_size: 2,
            ..TrainOptions::default()
        }
    }

    #[test]
    fn test_resolve_freq_defaults_to_one_epoch() {
        assert_eq!(resolve_freq(None, 10, 3), 4);
        assert_eq!(resolve_freq(Some(0), 10, 3), 4);
        assert_eq!(resolve_freq(Some(7), 10, 3), 7);
        assert_eq!(resolve_freq(None, 0, 3), 1);
    }

    const IMPROVED: Verdict = Verdict { improved: true, stop: false };
    const MISS:     Verdict = Verdict { improved: false, stop: false };
    const STOP:     Verdict = Verdict { improved: false, stop: true };

    fn verdicts(rule: StopRule, patience: usize, errs: &[f64]) -> Vec<Verdict> {
        let mut es = EarlyStopping::new(rule, patience);
        errs.iter().map(|&v| es.observe(v, 0.0)).collect()
    }

    /// One-based index of the first validation that stops training.
    fn stop_at(rule: StopRule, patience: usize, errs: &[f64]) -> Option<usize> {
        verdicts(rule, patience, errs).iter().position(|v| v.stop).map(|i| i + 1)
    }

    #[test]
    fn test_default_rule_is_window() {
        assert_eq!(StopRule::default(), StopRule::Window);
        assert_eq!(TrainOptions::default().stop_rule, StopRule::Window);
        assert_eq!("Consecutive".parse::<StopRule>().unwrap(), StopRule::Consecutive);
    }

    #[test]
    fn test_consecutive_rule_counts_every_miss() {
        assert_eq!(verdicts(StopRule::Consecutive, 2, &[0.5, 0.3, 0.35, 0.31, 0.4]), vec![
            IMPROVED, IMPROVED, MISS, MISS, STOP,
        ]);
    }

    #[test]
    fn test_window_rule_ignores_recent_history() {
        let v = verdicts(StopRule::Window, 2, &[0.5, 0.3, 0.35, 0.31, 0.4, 0.4]);
        // 0.35 is still better than 0.5, the minimum outside the window
        assert_eq!(v.len(), 6);
        assert_eq!(v[2], MISS);
        assert_eq!(v[4], MISS);
        assert_eq!(v[5], STOP);
    }

    #[test]
    fn test_window_rule_counts_a_tied_minimum() {
        let errs = [0.5, 0.3, 0.3, 0.4, 0.4, 0.4];
        let v = verdicts(StopRule::Window, 1, &errs);
        // The tie is a new best and still no better than the minimum outside the window
        assert_eq!(v[2], IMPROVED);
        let mut es = EarlyStopping::new(StopRule::Window, 1);
        for &e in &errs[..3] {
            es.observe(e, 0.0);
        }
        assert_eq!(es.bad_count(), 1);

        assert_eq!(stop_at(StopRule::Window, 1, &errs), Some(4));
        assert_eq!(stop_at(StopRule::Consecutive, 1, &errs), Some(5));
    }

    #[test]
    fn test_tie_counts_as_improvement() {
        assert_eq!(verdicts(StopRule::Consecutive, 0, &[0.3, 0.3, 0.31]), vec![IMPROVED, IMPROVED, STOP]);
    }

    #[test]
    fn test_plateau_stops_after_patience_plus_one() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path()).unwrap();
        let data = scripted_data();
        let opts = TrainOptions { stop_rule: StopRule::Consecutive, ..scripted_options() };
        let model = ScriptedModel { updates: 0, script: vec![0.5, 0.2, 0.4, 0.4, 0.4, 0.1, 0.1], nan_at: None };

        let out = LevelTrainer::new(Level::One, model, &opts, &data, &ckpt, InterruptFlag::default())
            .run()
            .unwrap();

        assert_eq!(out.report.stop_reason, StopReason::EarlyStop);
        assert_eq!(out.report.updates, 5);
        assert_eq!(out.report.epochs, 3);
        // Best snapshot is the one taken at the minimum (second validation)
        assert_eq!(out.model.updates, 2);
        assert!((out.report.valid_err - 0.2).abs() < 1e-9);

        let saved = ckpt.load_history().unwrap();
        assert_eq!(saved.history_errs.len(), 5);
        assert!(saved.report.is_some());
        assert_eq!(fs::read_to_string(tmp.path().join("model.json")).unwrap(), "2");
    }

    #[test]
    fn test_non_finite_cost_aborts() {
        let tmp   = tempfile::tempdir().unwrap();
        let ckpt  = CheckpointManager::new(tmp.path()).unwrap();
        let data  = scripted_data();
        let opts  = scripted_options();
        let model = ScriptedModel { updates: 0, script: vec![0.5; 20], nan_at: Some(3) };

        let err = LevelTrainer::new(Level::Two, model, &opts, &data, &ckpt, InterruptFlag::default())
            .run()
            .err()
            .unwrap();
        match err.downcast_ref::<TrainError>() {
            Some(TrainError::Diverged { level, update, .. }) => {
                assert_eq!(*level, Level::Two);
                assert_eq!(*update, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_interrupt_still_finalises() {
        let tmp   = tempfile::tempdir().unwrap();
        let ckpt  = CheckpointManager::new(tmp.path()).unwrap();
        let data  = scripted_data();
        let opts  = scripted_options();
        let flag  = InterruptFlag::default();
        flag.trigger();
        let model = ScriptedModel { updates: 0, script: vec![0.3], nan_at: None };

        let out = LevelTrainer::new(Level::One, model, &opts, &data, &ckpt, flag).run().unwrap();
        assert_eq!(out.report.stop_reason, StopReason::Interrupted);
        assert_eq!(out.report.updates, 0);
        assert_eq!(out.report.predictions.len(), 10);
        assert!(tmp.path().join("model.json").exists());
    }

    #[test]
    fn test_empty_valid_split_is_rejected() {
        let tmp   = tempfile::tempdir().unwrap();
        let ckpt  = CheckpointManager::new(tmp.path()).unwrap();
        let data  = LevelData { valid: LabeledSet::default(), ..scripted_data() };
        let opts  = scripted_options();
        let model = ScriptedModel { updates: 0, script: vec![0.3], nan_at: None };
        assert!(LevelTrainer::new(Level::One, model, &opts, &data, &ckpt, InterruptFlag::default())
            .run()
            .is_err());
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let data = LevelData { train: set(10, 3), valid: set(4, 3), test: set(4, 3) };
        let opts = TrainOptions {
            patience:   100,
            max_epochs: 2,
            valid_freq: Some(2),
            save_freq:  Some(3),
            batch_size: 3,
            seed:       7,
            ..TrainOptions::default()
        };

        // Uninterrupted: 2 epochs of 4 batches
        let full_dir = tempfile::tempdir().unwrap();
        let full_ckpt = CheckpointManager::new(full_dir.path()).unwrap();
        let full = LevelTrainer::new(Level::One, DriftModel { w: 0.0 }, &opts, &data, &full_ckpt, InterruptFlag::default())
            .run()
            .unwrap();

        // First epoch only; the last periodic save is mid-epoch at update 3
        let split_dir  = tempfile::tempdir().unwrap();
        let split_ckpt = CheckpointManager::new(split_dir.path()).unwrap();
        let first_opts = TrainOptions { max_epochs: 1, ..opts.clone() };
        LevelTrainer::new(Level::One, DriftModel { w: 0.0 }, &first_opts, &data, &split_ckpt, InterruptFlag::default())
            .run()
            .unwrap();
        let saved = split_ckpt.load_state().unwrap().unwrap();
        assert_eq!((saved.update, saved.epoch, saved.batches_in_epoch), (3, 0, 3));

        let resume_opts = TrainOptions { resume: true, ..opts.clone() };
        let resumed = LevelTrainer::new(Level::One, DriftModel { w: 0.0 }, &resume_opts, &data, &split_ckpt, InterruptFlag::default())
            .run()
            .unwrap();

        assert_eq!(resumed.report.updates, full.report.updates);
        assert_eq!(resumed.model.w, full.model.w);
        assert_eq!(
            split_ckpt.load_history().unwrap().history_errs.len(),
            full_ckpt.load_history().unwrap().history_errs.len()
        );

        // The validation at update 4 ran after the last save; it is logged once
        let csv = |dir: &Path| fs::read_to_string(dir.join("history.csv")).unwrap();
        assert_eq!(csv(split_dir.path()), csv(full_dir.path()));
        assert_eq!(csv(full_dir.path()).lines().count(), 1 + 4);
    }
}
