// ============================================================
// Layer 5 — Optimisers
// ============================================================
// Three update rules, selected by name:
//
//   sgd      → plain SGD at the configured learning rate
//   adadelta → per-parameter adaptive steps (Zeiler, 2012);
//              ignores the learning rate
//   rmsprop  → centred RMSProp with momentum
//
// Burn ships SGD and RMSProp. Adadelta is written here as a
// SimpleOptimizer so Burn's OptimizerAdaptor handles the
// per-parameter state bookkeeping and its record persistence.
//
//   E[g²]  = ρ·E[g²]  + (1-ρ)·g²
//   Δx     = -√(E[Δx²] + ε) / √(E[g²] + ε) · g
//   E[Δx²] = ρ·E[Δx²] + (1-ρ)·Δx²
//   x      = x + Δx
//
// Reference: Burn Book §5 (Optimizers)
//            Zeiler (2012) ADADELTA: An Adaptive Learning Rate Method

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, LearningRate, SimpleOptimizer},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adadelta,
    RmsProp,
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd"      => Ok(OptimizerKind::Sgd),
            "adadelta" => Ok(OptimizerKind::Adadelta),
            "rmsprop"  => Ok(OptimizerKind::RmsProp),
            other      => Err(format!("unknown optimizer '{other}' (expected sgd, adadelta or rmsprop)")),
        }
    }
}

#[derive(Config, Debug)]
pub struct AdadeltaConfig {
    /// Decay of both running averages
    #[config(default = 0.95)]
    pub rho: f32,
    #[config(default = 1e-6)]
    pub epsilon: f32,
}

impl AdadeltaConfig {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Adadelta, M, B> {
        OptimizerAdaptor::from(Adadelta { rho: self.rho, epsilon: self.epsilon })
    }
}

#[derive(Clone, Debug)]
pub struct Adadelta {
    rho:     f32,
    epsilon: f32,
}

/// Running averages of squared gradients and squared updates.
#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub grad_sq:  Tensor<B, D>,
    pub delta_sq: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        _lr:    LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (grad_sq, delta_sq) = match state {
            Some(s) => (s.grad_sq, s.delta_sq),
            None    => (grad.zeros_like(), grad.zeros_like()),
        };
        let rho = self.rho as f64;

        let grad_sq = grad_sq.mul_scalar(rho) + grad.clone().powf_scalar(2.0).mul_scalar(1.0 - rho);
        let delta = delta_sq.clone().add_scalar(self.epsilon).sqrt()
            .div(grad_sq.clone().add_scalar(self.epsilon).sqrt())
            .mul(grad)
            .neg();
        let delta_sq = delta_sq.mul_scalar(rho) + delta.clone().powf_scalar(2.0).mul_scalar(1.0 - rho);

        (tensor + delta, Some(AdadeltaState { grad_sq, delta_sq }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        AdadeltaState {
            grad_sq:  state.grad_sq.to_device(device),
            delta_sq: state.delta_sq.to_device(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_first_step_matches_closed_form() {
        let device = Default::default();
        let optim  = Adadelta { rho: 0.95, epsilon: 1e-6 };
        let x      = Tensor::<TestBackend, 1>::from_floats([1.0, -2.0], &device);
        let g      = Tensor::<TestBackend, 1>::from_floats([0.5, -0.5], &device);

        let (x1, state) = optim.step(1.0, x, g, None);
        let x1: Vec<f32> = x1.into_data().to_vec().unwrap();

        // E[g²] = 0.05 · 0.25; Δ = -√ε / √(E[g²] + ε) · g
        let eg2   = 0.05f32 * 0.25;
        let step  = (1e-6f32).sqrt() / (eg2 + 1e-6).sqrt() * 0.5;
        assert!((x1[0] - (1.0 - step)).abs() < 1e-6);
        assert!((x1[1] - (-2.0 + step)).abs() < 1e-6);
        assert!(state.is_some());
    }

    #[test]
    fn test_learning_rate_is_ignored() {
        let device = Default::default();
        let optim  = Adadelta { rho: 0.95, epsilon: 1e-6 };
        let x      = Tensor::<TestBackend, 1>::from_floats([0.3], &device);
        let g      = Tensor::<TestBackend, 1>::from_floats([0.1], &device);
        let (a, _) = optim.step(1.0, x.clone(), g.clone(), None);
        let (b, _) = optim.step(1e-4, x, g, None);
        let a: Vec<f32> = a.into_data().to_vec().unwrap();
        let b: Vec<f32> = b.into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_optimizer_kind_parses() {
        assert_eq!("RMSProp".parse::<OptimizerKind>().unwrap(), OptimizerKind::RmsProp);
        assert!("adam".parse::<OptimizerKind>().is_err());
    }
}
