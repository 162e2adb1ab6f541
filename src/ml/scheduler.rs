// ============================================================
// Layer 5 — Reduce-on-Plateau Learning Rate Schedule
// ============================================================
// Watches the validation F1 (mode = max). When the metric has
// not beaten the best seen so far by a relative margin for more
// than `patience` epochs, the learning rate is multiplied by
// `factor`.
//
//   better  ⇔  f1 > best · (1 + threshold)
//   reduce  ⇔  bad_epochs > patience
//
// With the defaults (factor 0.5, patience 0) every epoch that
// fails to improve halves the learning rate.
//
// The mutable part lives in domain::checkpoint::SchedulerState
// so it can be written into resumable checkpoints verbatim.

use crate::domain::checkpoint::SchedulerState;

#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor:    f64,
    patience:  usize,
    threshold: f64,
    min_lr:    f64,
    /// Reductions smaller than this are ignored
    eps:       f64,
    state:     SchedulerState,
}

impl ReduceLrOnPlateau {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            factor:    0.5,
            patience:  0,
            threshold: 1e-4,
            min_lr:    0.0,
            eps:       1e-8,
            state: SchedulerState { learning_rate, best: None, bad_epochs: 0 },
        }
    }

    /// Continue from a checkpointed state
    pub fn with_state(mut self, state: SchedulerState) -> Self {
        self.state = state;
        self
    }

    pub fn learning_rate(&self) -> f64 {
        self.state.learning_rate
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Feed one epoch's validation metric. Returns the learning
    /// rate to use for the next epoch.
    pub fn step(&mut self, metric: f64) -> f64 {
        let improved = match self.state.best {
            None       => true,
            Some(best) => metric > best * (1.0 + self.threshold),
        };

        if improved {
            self.state.best = Some(metric);
            self.state.bad_epochs = 0;
        } else {
            self.state.bad_epochs += 1;
        }

        if self.state.bad_epochs > self.patience {
            let old_lr = self.state.learning_rate;
            let new_lr = (old_lr * self.factor).max(self.min_lr);
            if old_lr - new_lr > self.eps {
                self.state.learning_rate = new_lr;
                tracing::info!("Reducing learning rate {:.2e} → {:.2e}", old_lr, new_lr);
            }
            self.state.bad_epochs = 0;
        }

        self.state.learning_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halves_on_every_plateau_epoch() {
        let mut sched = ReduceLrOnPlateau::new(4e-4);
        assert_eq!(sched.step(0.5), 4e-4);
        assert_eq!(sched.step(0.6), 4e-4);
        assert_eq!(sched.step(0.55), 2e-4);
        assert_eq!(sched.step(0.55), 1e-4);
        // improvement keeps the reduced rate
        assert_eq!(sched.step(0.7), 1e-4);
        assert_eq!(sched.state().best, Some(0.7));
    }

    #[test]
    fn test_tiny_gain_is_not_improvement() {
        let mut sched = ReduceLrOnPlateau::new(1.0);
        sched.step(0.5);
        // 0.50001 < 0.5 * 1.0001
        assert_eq!(sched.step(0.50001), 0.5);
    }

    #[test]
    fn test_patience_delays_reduction() {
        let mut sched = ReduceLrOnPlateau { patience: 2, ..ReduceLrOnPlateau::new(1.0) };
        sched.step(0.9);
        assert_eq!(sched.step(0.1), 1.0);
        assert_eq!(sched.step(0.1), 1.0);
        assert_eq!(sched.step(0.1), 0.5);
        assert_eq!(sched.state().bad_epochs, 0);
    }

    #[test]
    fn test_resumes_from_state() {
        let state = SchedulerState { learning_rate: 1e-3, best: Some(0.8), bad_epochs: 0 };
        let mut sched = ReduceLrOnPlateau::new(4e-4).with_state(state);
        assert_eq!(sched.learning_rate(), 1e-3);
        assert_eq!(sched.step(0.7), 5e-4);
    }
}
