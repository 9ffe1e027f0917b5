use shared::{Clock, TickTime};

/// Clock advancing by the same step every tick.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: f32,
    elapsed: f64,
}

impl FixedStepClock {
    pub fn new(step: f32) -> Self {
        Self { step, elapsed: 0.0 }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl Clock for FixedStepClock {
    fn tick(&mut self) -> TickTime {
        self.elapsed += self.step as f64;
        TickTime {
            delta: self.step,
            elapsed: self.elapsed,
        }
    }
}

/// Repeating countdown. Counts up from 0 to `period`.
#[derive(Debug, Clone)]
pub struct Interval {
    pub period: f32,
    pub value: f32,
}

impl Interval {
    pub fn new(period: f32) -> Self {
        Self { period, value: 0.0 }
    }

    /// Advances by `dt`. Returns true once per elapsed period, wrapping the value back.
    pub fn update(&mut self, dt: f32) -> bool {
        self.value += dt;
        if self.period > 0.0 && self.value >= self.period {
            self.value %= self.period;
            true
        } else {
            false
        }
    }
}
