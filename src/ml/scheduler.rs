// ============================================================
// Layer 5 — Plateau Learning-Rate Scheduler
// ============================================================
// Burn's optimiser takes the learning rate on every `step` call,
// so the scheduler only has to track the current value:
//
//   lr = scheduler.lr();
//   model = optim.step(lr, model, grads);
//   ...end of epoch...
//   scheduler.step(avg_val_loss);
//
// Behaviour (mode "min"):
//   improved  ⇔  metric < best * (1 - threshold)
//   after more than `patience` non-improving epochs in a row:
//       lr = max(lr * factor, min_lr)   and the counter resets
//
// Reference: Burn Book §5 (Custom Training Loop)

#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    lr:             f64,
    factor:         f64,
    patience:       usize,
    threshold:      f64,
    min_lr:         f64,
    best:           f64,
    num_bad_epochs: usize,
    steps:          usize,
}

impl PlateauScheduler {
    /// Plateau decay with factor 0.1, relative threshold 1e-4 and
    /// a learning-rate floor of 1e-5.
    pub fn new(initial_lr: f64, patience: usize) -> Self {
        Self::with_options(initial_lr, 0.1, patience, 1e-4, 1e-5)
    }

    pub fn with_options(
        initial_lr: f64,
        factor:     f64,
        patience:   usize,
        threshold:  f64,
        min_lr:     f64,
    ) -> Self {
        assert!(factor > 0.0 && factor < 1.0, "factor must be in (0, 1), got {factor}");
        Self {
            lr: initial_lr,
            factor,
            patience,
            threshold,
            min_lr,
            best: f64::INFINITY,
            num_bad_epochs: 0,
            steps: 0,
        }
    }

    /// Current learning rate
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Best metric seen so far (`inf` before the first step)
    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Feed one epoch's validation metric. Returns true when the
    /// learning rate was reduced.
    pub fn step(&mut self, metric: f64) -> bool {
        self.steps += 1;

        if metric < self.best * (1.0 - self.threshold) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs <= self.patience {
            return false;
        }
        self.num_bad_epochs = 0;

        let new_lr = (self.lr * self.factor).max(self.min_lr);
        if new_lr >= self.lr {
            // Already sitting on the floor
            return false;
        }
        tracing::info!("Reducing learning rate: {:.3e} → {:.3e}", self.lr, new_lr);
        self.lr = new_lr;
        true
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improving_metric_keeps_lr() {
        let mut s = PlateauScheduler::new(1e-3, 2);
        for loss in [1.0, 0.9, 0.8, 0.7, 0.6] {
            assert!(!s.step(loss));
        }
        assert_eq!(s.lr(), 1e-3);
        assert_eq!(s.best(), 0.6);
    }

    #[test]
    fn test_decays_after_patience_exceeded() {
        let mut s = PlateauScheduler::new(1e-3, 2);
        s.step(1.0);
        // Two bad epochs are tolerated, the third triggers the decay
        assert!(!s.step(1.0));
        assert!(!s.step(1.0));
        assert!(s.step(1.0));
        assert!((s.lr() - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_tiny_improvement_counts_as_plateau() {
        let mut s = PlateauScheduler::new(1e-3, 0);
        s.step(1.0);
        // 1e-6 relative gain is below the 1e-4 threshold
        assert!(s.step(0.999_999));
        assert_eq!(s.best(), 1.0);
    }

    #[test]
    fn test_lr_never_drops_below_floor() {
        let mut s = PlateauScheduler::new(1e-3, 0);
        s.step(1.0);
        for _ in 0..10 {
            s.step(1.0);
        }
        assert!((s.lr() - 1e-5).abs() < 1e-15);
        assert_eq!(s.steps(), 11);
    }
}
