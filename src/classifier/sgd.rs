// Binary logistic regression trained by stochastic gradient descent.
//
// L2-regularized, "optimal" learning-rate schedule, per-epoch shuffling from
// a seeded RNG so training is reproducible. Weights are stored dense with a
// separate scale factor so the L2 shrink on every step is O(1) instead of
// O(n_features).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::vectorizer::SparseVec;

pub const ALPHA: f64 = 1e-4;
pub const MAX_EPOCHS: usize = 1000;
pub const TOL: f64 = 1e-3;
pub const EPOCHS_NO_CHANGE: usize = 5;
pub const SEED: u64 = 42;

/// Rescale the weight vector into place once the lazy scale gets this small.
const MIN_WSCALE: f64 = 1e-9;

/// Logistic loss for y in {-1, +1}, guarded against overflow.
fn log_loss(p: f64, y: f64) -> f64 {
    let z = p * y;
    if z > 18.0 {
        (-z).exp()
    } else if z < -18.0 {
        -z
    } else {
        (-z).exp().ln_1p()
    }
}

/// Derivative of the logistic loss with respect to the prediction.
fn log_dloss(p: f64, y: f64) -> f64 {
    let z = p * y;
    if z > 18.0 {
        -y * (-z).exp()
    } else if z < -18.0 {
        -y
    } else {
        -y / (z.exp() + 1.0)
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdClassifier {
    weights: Vec<f64>,
    intercept: f64,
    /// Step counter; drives the learning-rate schedule across calls.
    t: f64,
}

struct Step {
    wscale: f64,
    optimal_init: f64,
}

impl SgdClassifier {
    pub fn new(n_features: usize) -> Self {
        Self {
            weights: vec![0.0; n_features],
            intercept: 0.0,
            t: 1.0,
        }
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Fit from scratch. Returns the number of epochs run.
    pub fn fit(&mut self, x: &[SparseVec], y: &[i64]) -> usize {
        *self = Self::new(self.weights.len());
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut order: Vec<usize> = (0..x.len()).collect();

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut epochs = 0;

        for _ in 0..MAX_EPOCHS {
            order.shuffle(&mut rng);
            let loss = self.epoch(x, y, &order);
            epochs += 1;

            if loss > best_loss - TOL * x.len() as f64 {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);
            if no_improvement >= EPOCHS_NO_CHANGE {
                break;
            }
        }

        debug!(epochs, samples = x.len(), "SGD fit converged");
        epochs
    }

    /// One pass over new samples, continuing from the current weights and step count.
    pub fn partial_fit(&mut self, x: &[SparseVec], y: &[i64]) {
        let mut rng = StdRng::seed_from_u64(SEED ^ self.t as u64);
        let mut order: Vec<usize> = (0..x.len()).collect();
        order.shuffle(&mut rng);
        self.epoch(x, y, &order);
    }

    /// Run one epoch in the given order; returns the summed loss.
    fn epoch(&mut self, x: &[SparseVec], y: &[i64], order: &[usize]) -> f64 {
        let typw = (1.0 / ALPHA.sqrt()).sqrt();
        let eta0 = typw / log_dloss(-typw, 1.0).abs().max(1.0);
        let mut step = Step {
            wscale: 1.0,
            optimal_init: 1.0 / (eta0 * ALPHA),
        };

        let mut total_loss = 0.0;
        for &i in order {
            let row = &x[i];
            let target = if y[i] == 1 { 1.0 } else { -1.0 };
            let p = self.dot(row) * step.wscale + self.intercept;
            let eta = 1.0 / (ALPHA * (step.optimal_init + self.t - 1.0));
            let update = -eta * log_dloss(p, target);

            if update != 0.0 {
                for &(j, v) in row {
                    self.weights[j] += v * update / step.wscale;
                }
                self.intercept += update;
            }

            step.wscale *= (1.0 - eta * ALPHA).max(0.0);
            if step.wscale < MIN_WSCALE {
                self.rescale(&mut step);
            }

            self.t += 1.0;
            total_loss += log_loss(p, target);
        }
        self.rescale(&mut step);
        total_loss
    }

    fn rescale(&mut self, step: &mut Step) {
        if step.wscale != 1.0 {
            for w in self.weights.iter_mut() {
                *w *= step.wscale;
            }
            step.wscale = 1.0;
        }
    }

    fn dot(&self, row: &SparseVec) -> f64 {
        row.iter()
            .filter_map(|&(j, v)| self.weights.get(j).map(|w| w * v))
            .sum()
    }

    /// Raw margin `w·x + b`.
    pub fn decision(&self, row: &SparseVec) -> f64 {
        self.dot(row) + self.intercept
    }

    /// Estimated probability of the positive class.
    pub fn probability(&self, row: &SparseVec) -> f64 {
        sigmoid(self.decision(row))
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> (Vec<SparseVec>, Vec<i64>) {
        // Feature 0 marks positives, feature 1 marks negatives
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..10 {
            x.push(vec![(0, 1.0)]);
            y.push(1);
            x.push(vec![(1, 1.0)]);
            y.push(0);
        }
        (x, y)
    }

    #[test]
    fn test_loss_is_stable_at_extremes() {
        assert!(log_loss(1e6, 1.0).is_finite());
        assert!(log_loss(-1e6, 1.0).is_finite());
        assert_eq!(log_dloss(-1e6, 1.0), -1.0);
        assert!((log_loss(0.0, 1.0) - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_fit_separates_toy_data() {
        let (x, y) = toy();
        let mut clf = SgdClassifier::new(2);
        let epochs = clf.fit(&x, &y);
        assert!(epochs >= 1 && epochs <= MAX_EPOCHS);
        assert!(clf.probability(&vec![(0, 1.0)]) > 0.5);
        assert!(clf.probability(&vec![(1, 1.0)]) < 0.5);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = toy();
        let mut a = SgdClassifier::new(2);
        let mut b = SgdClassifier::new(2);
        a.fit(&x, &y);
        b.fit(&x, &y);
        assert_eq!(a, b);
    }

    #[test]
    fn test_partial_fit_moves_toward_new_label() {
        let (x, y) = toy();
        let mut clf = SgdClassifier::new(2);
        clf.fit(&x, &y);
        let before = clf.probability(&vec![(1, 1.0)]);
        let t_before = clf.t;
        clf.partial_fit(&[vec![(1, 1.0)], vec![(1, 1.0)]], &[1, 1]);
        assert!(clf.probability(&vec![(1, 1.0)]) > before);
        assert_eq!(clf.t, t_before + 2.0);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
    }
}
