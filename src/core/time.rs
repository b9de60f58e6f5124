//! Fixed-timestep accumulator

/// Converts variable frame times into a whole number of fixed steps.
///
/// Leftover time carries over to the next frame. When a frame would need more
/// than `max_steps`, the excess is dropped so a long stall cannot snowball.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    /// Length of one step in seconds
    step: f32,
    /// Unconsumed time
    accumulator: f32,
    /// Step cap per frame
    max_steps: u32,
    /// Total steps run
    total_steps: u64,
}

impl FixedTimestep {
    /// Create an accumulator
    #[must_use]
    pub fn new(step: f32, max_steps: u32) -> Self {
        Self {
            step,
            accumulator: 0.0,
            max_steps: max_steps.max(1),
            total_steps: 0,
        }
    }

    /// Length of one step
    #[must_use]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Total steps run so far
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Fraction of a step left in the accumulator, for interpolation
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }

    /// Add frame time and return how many fixed steps to run
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if !(frame_dt > 0.0) {
            return 0;
        }

        self.accumulator += frame_dt;
        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps {
            self.accumulator -= self.step;
            steps += 1;
        }

        if steps == self.max_steps && self.accumulator >= self.step {
            log::warn!(
                "Dropping {:.3}s of simulation time after {steps} steps",
                self.accumulator
            );
            self.accumulator %= self.step;
        }

        self.total_steps += u64::from(steps);
        steps
    }
}
