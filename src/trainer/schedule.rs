use serde::{Deserialize, Serialize};

use super::logger::ansi;

/// Everything a [`PlateauLR`] needs to resume exactly where it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub lr: f32,
    pub best: f32,
    pub num_bad_epochs: usize,
}

/// Multiplies the learning rate by `factor` once the monitored loss has not
/// improved for more than `patience` consecutive epochs.
///
/// An epoch improves on the best loss seen so far if it is lower by more than
/// the relative `threshold`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlateauLR {
    pub factor: f32,
    pub patience: usize,
    pub threshold: f32,
    pub min_lr: f32,
    pub eps: f32,
    state: ScheduleState,
}

impl PlateauLR {
    pub fn new(lr: f32, patience: usize) -> Self {
        Self {
            factor: 0.5,
            patience,
            threshold: 1e-4,
            min_lr: 0.0,
            eps: 1e-8,
            state: ScheduleState { lr, best: f32::INFINITY, num_bad_epochs: 0 },
        }
    }

    pub fn lr(&self) -> f32 {
        self.state.lr
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn restore(&mut self, state: ScheduleState) {
        self.state = state;
    }

    /// Records one epoch's loss. Returns `true` if the learning rate dropped.
    pub fn step(&mut self, loss: f32) -> bool {
        let state = &mut self.state;

        if loss < state.best * (1.0 - self.threshold) {
            state.best = loss;
            state.num_bad_epochs = 0;
        } else {
            state.num_bad_epochs += 1;
        }

        if state.num_bad_epochs > self.patience {
            state.num_bad_epochs = 0;

            let new_lr = (state.lr * self.factor).max(self.min_lr);
            if state.lr - new_lr > self.eps {
                state.lr = new_lr;
                return true;
            }
        }

        false
    }

    pub fn colourful(&self) -> String {
        format!(
            "start {} factor {} on plateau, patience {}",
            ansi(self.state.lr, 31),
            ansi(self.factor, 31),
            ansi(self.patience, 31)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_after_patience_exceeded() {
        let mut sched = PlateauLR::new(0.001, 2);

        assert!(!sched.step(1.0));
        assert!(!sched.step(0.5));
        assert!(!sched.step(0.6));
        assert!(!sched.step(0.5));
        assert_eq!(sched.lr(), 0.001);

        // third epoch without improvement
        assert!(sched.step(0.7));
        assert_eq!(sched.lr(), 0.0005);
        assert_eq!(sched.state().num_bad_epochs, 0);
        assert_eq!(sched.state().best, 0.5);
    }

    #[test]
    fn zero_patience_drops_on_every_bad_epoch() {
        let mut sched = PlateauLR::new(1.0, 0);
        assert!(!sched.step(1.0));
        assert!(sched.step(1.0));
        assert!(sched.step(2.0));
        assert_eq!(sched.lr(), 0.25);
        assert!(!sched.step(0.1));
    }

    #[test]
    fn tiny_improvements_do_not_count() {
        let mut sched = PlateauLR::new(1.0, 0);
        sched.step(1.0);
        assert!(sched.step(0.99999));
    }

    #[test]
    fn restore_continues_exactly() {
        let mut a = PlateauLR::new(0.01, 1);
        a.step(1.0);
        a.step(1.5);

        let mut b = PlateauLR::new(0.01, 1);
        b.restore(a.state());

        assert_eq!(a.step(1.2), b.step(1.2));
        assert_eq!(a, b);
    }

    #[test]
    fn state_survives_toml() {
        let state = ScheduleState { lr: 0.001, best: f32::INFINITY, num_bad_epochs: 3 };
        let text = toml::to_string(&state).unwrap();
        assert_eq!(toml::from_str::<ScheduleState>(&text).unwrap(), state);
    }
}
