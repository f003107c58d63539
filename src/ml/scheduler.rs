// ============================================================
// Layer 5 - Warmup / Cosine Learning-Rate Schedule
// ============================================================
//   t < warmup :  scale = t / warmup
//   otherwise  :  progress = (t - warmup) / (total - warmup)
//                 scale    = 0.5 * (1 + cos(pi * progress))
//
//   lr(t) = base_lr * scale + min_lr
//
// min_lr is added on top of the scaled rate, so the peak is
// base_lr + min_lr and both ends of the schedule sit at min_lr.
// progress is not clamped; stepping past `total` climbs back up
// the cosine.

use std::f64::consts::PI;

use crate::domain::error::{LmError, LmResult};

#[derive(Debug, Clone)]
pub struct WarmupCosineLr {
    base_lr:      f64,
    min_lr:       f64,
    warmup_steps: usize,
    total_steps:  usize,
    step:         usize,
}

impl WarmupCosineLr {
    pub fn new(base_lr: f64, min_lr: f64, warmup_steps: usize, total_steps: usize) -> LmResult<Self> {
        if total_steps == 0 {
            return Err(LmError::InvalidConfig("total_steps must be positive".to_string()));
        }
        if warmup_steps >= total_steps {
            return Err(LmError::InvalidConfig(format!(
                "warmup_steps ({warmup_steps}) must be smaller than total_steps ({total_steps})"
            )));
        }
        if !base_lr.is_finite() || !min_lr.is_finite() || base_lr < 0.0 || min_lr < 0.0 {
            return Err(LmError::InvalidConfig(format!(
                "learning rates must be finite and non-negative (base={base_lr}, min={min_lr})"
            )));
        }
        Ok(Self { base_lr, min_lr, warmup_steps, total_steps, step: 0 })
    }

    /// `max_epochs * ceil(dataset_size / batch_size)`
    pub fn total_steps_for(max_epochs: usize, dataset_size: usize, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        max_epochs * dataset_size.div_ceil(batch_size)
    }

    pub fn lr_at(&self, t: usize) -> f64 {
        let scale = if t < self.warmup_steps {
            t as f64 / self.warmup_steps as f64
        } else {
            let progress =
                (t - self.warmup_steps) as f64 / (self.total_steps - self.warmup_steps) as f64;
            0.5 * (1.0 + (PI * progress).cos())
        };
        self.base_lr * scale + self.min_lr
    }

    /// Rate for the current step, then advance the counter.
    pub fn step(&mut self) -> f64 {
        let lr = self.lr_at(self.step);
        self.step += 1;
        lr
    }

    pub fn current_step(&self) -> usize {
        self.step
    }
}
